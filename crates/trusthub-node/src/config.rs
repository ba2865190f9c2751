//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trusthub_agents::AttestationKind;
use trusthub_identity::IssuerEntry;

/// Full configuration for the Trust Hub node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustHubConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Ledger storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ledger retention.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Prior-authorization decision settings.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Semantic and structural validation.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Attestation agents and the identities they sign as.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,

    /// Trusted issuers.
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Rocksdb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
    /// How often expired records are purged. Zero disables the sweep.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    AcceptVerified,
    RequireCompliant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default = "default_policy")]
    pub policy: PolicyKind,
    /// Length of an approval window.
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// Fixed answer; for demos and local testing.
    Static,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_validator_kind")]
    pub kind: ValidatorKind,
    /// Endpoint of the HTTP validator.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Answer given by the static validator.
    #[serde(default = "default_true")]
    pub static_valid: bool,
    #[serde(default = "default_static_reason")]
    pub static_reason: String,
}

/// One attestation agent. Each kind may appear at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub kind: AttestationKind,
    /// Registry id of the issuer this agent signs as.
    pub issuer_id: String,
    /// File holding the base64 Ed25519 seed.
    pub seed_path: PathBuf,
    /// Credential type to issue instead of the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    /// Built-in structural check run before validation. Falls back to the
    /// kind's own check when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl AgentConfig {
    /// Default identity and seed location for `kind`.
    pub fn for_kind(kind: AttestationKind) -> Self {
        let (issuer_id, seed) = match kind {
            AttestationKind::Healthcare => ("did:web:cms.gov:agent:a2a-v1", "issuer.seed"),
            AttestationKind::Diagnostic => ("did:web:lab-v1.gov", "lab.seed"),
            AttestationKind::Medication => ("did:web:pbm-v1.gov", "pbm.seed"),
        };
        Self {
            kind,
            issuer_id: issuer_id.into(),
            seed_path: PathBuf::from("./keys").join(seed),
            credential_type: None,
            schema: None,
        }
    }

    /// Structural check id in effect for this agent.
    pub fn structural_check(&self) -> Option<&str> {
        self.schema
            .as_deref()
            .or_else(|| self.kind.default_structural_check())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub issuers: Vec<IssuerEntry>,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_backend() -> StorageBackend {
    StorageBackend::Rocksdb
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_ttl_days() -> i64 {
    trusthub_agents::ledger::DEFAULT_TTL_DAYS
}
fn default_purge_interval() -> u64 {
    3600
}
fn default_policy() -> PolicyKind {
    PolicyKind::AcceptVerified
}
fn default_validity_days() -> i64 {
    trusthub_agents::authorization::DEFAULT_VALIDITY_DAYS
}
fn default_validator_kind() -> ValidatorKind {
    ValidatorKind::Static
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_static_reason() -> String {
    "Static validator: claims accepted".into()
}
fn default_agents() -> Vec<AgentConfig> {
    vec![AgentConfig::for_kind(AttestationKind::Healthcare)]
}

impl Default for TrustHubConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            ledger: LedgerConfig::default(),
            authorization: AuthorizationConfig::default(),
            validator: ValidatorConfig::default(),
            agents: default_agents(),
            registry: RegistryConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            validity_days: default_validity_days(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            kind: default_validator_kind(),
            endpoint: None,
            timeout_ms: default_timeout_ms(),
            static_valid: true,
            static_reason: default_static_reason(),
        }
    }
}

impl TrustHubConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: TrustHubConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Socket address string the API binds to.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
