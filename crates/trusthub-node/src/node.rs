//! The Trust Hub node orchestrator.
//!
//! Loads the trust registry and signing identity, opens the ledger, wires the
//! agents behind a dispatcher and serves them over HTTP.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use trusthub_agents::{
    structural_validator, AcceptVerified, AttestationService, AuthorizationDecisionService,
    AuthorizationPolicy, Dispatcher, InMemoryLedger, LedgerStore, RequireCompliantStatus,
    SemanticValidator, StaticValidator,
};
use trusthub_credentials::{CredentialIssuer, CredentialVerifier};
use trusthub_crypto::KeyPair;
use trusthub_identity::TrustRegistry;

use crate::config::{PolicyKind, StorageBackend, TrustHubConfig, ValidatorKind};
use crate::state::AppState;
use crate::storage::Storage;
use crate::validator::HttpSemanticValidator;

pub struct TrustHubNode {
    config: TrustHubConfig,
    state: Arc<AppState>,
    ledger: Arc<dyn LedgerStore>,
}

impl TrustHubNode {
    /// Build a node from configuration. Registry, key or storage problems are
    /// fatal here, before anything is served.
    pub fn new(config: TrustHubConfig) -> Result<Self> {
        let keys = config
            .agents
            .iter()
            .map(|agent| load_keypair(&agent.seed_path))
            .collect::<Result<Vec<_>>>()?;

        let ledger: Arc<dyn LedgerStore> = match config.storage.backend {
            StorageBackend::Rocksdb => {
                let storage = Storage::open(&config.storage.data_dir)?;
                tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");
                Arc::new(storage)
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory ledger; records are lost on restart");
                Arc::new(InMemoryLedger::new())
            }
        };

        let validator = build_validator(&config)?;
        let state = build_state(&config, keys, ledger.clone(), validator)?;

        tracing::info!(
            agents = config.agents.len(),
            issuers = state.registry.len(),
            "Trust Hub node created"
        );

        Ok(Self {
            config,
            state,
            ledger,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Serve the API until it fails; runs the ledger purge sweep alongside.
    pub async fn run(&self) -> Result<()> {
        if self.config.ledger.purge_interval_secs > 0 {
            let ledger = self.ledger.clone();
            let every = Duration::from_secs(self.config.ledger.purge_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    if let Err(e) = ledger.purge_expired(chrono::Utc::now()).await {
                        tracing::error!(error = %e, "ledger purge failed");
                    }
                }
            });
        }

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        crate::api::start_api_server(api_addr, self.state.clone()).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Trust Hub node shut down");
        Ok(())
    }
}

/// Wire registry, issuers, agents and dispatcher.
///
/// `keys` holds one signing key per entry of `config.agents`, in order.
pub fn build_state(
    config: &TrustHubConfig,
    keys: Vec<KeyPair>,
    ledger: Arc<dyn LedgerStore>,
    validator: Arc<dyn SemanticValidator>,
) -> Result<Arc<AppState>> {
    if keys.len() != config.agents.len() {
        anyhow::bail!(
            "{} signing keys for {} configured agents",
            keys.len(),
            config.agents.len()
        );
    }
    let registry = Arc::new(
        TrustRegistry::from_entries(config.registry.issuers.clone())
            .context("invalid trust registry")?,
    );
    let verifier = Arc::new(CredentialVerifier::new(registry.clone()));
    let ttl = chrono::Duration::days(config.ledger.ttl_days);

    let policy: Arc<dyn AuthorizationPolicy> = match config.authorization.policy {
        PolicyKind::AcceptVerified => Arc::new(AcceptVerified),
        PolicyKind::RequireCompliant => Arc::new(RequireCompliantStatus),
    };
    let authorization = AuthorizationDecisionService::new(verifier.clone(), ledger.clone())
        .with_policy(policy)
        .with_validity(chrono::Duration::days(config.authorization.validity_days))
        .with_ledger_ttl(ttl);

    let mut dispatcher = Dispatcher::new(Arc::new(authorization), verifier);
    let mut seen = Vec::new();
    for (agent, keypair) in config.agents.iter().zip(keys) {
        if seen.contains(&agent.kind) {
            anyhow::bail!("attestation agent '{}' configured twice", agent.kind);
        }
        seen.push(agent.kind);

        let issuer = Arc::new(
            CredentialIssuer::new(agent.issuer_id.clone(), keypair, &registry).with_context(
                || format!("signing identity {} does not match the registry", agent.issuer_id),
            )?,
        );
        let mut attestation = AttestationService::new(issuer, validator.clone(), ledger.clone())
            .with_kind(agent.kind)
            .with_ledger_ttl(ttl);
        if let Some(credential_type) = &agent.credential_type {
            attestation = attestation.with_credential_type(credential_type.clone());
        }
        if let Some(check) = agent.structural_check() {
            let structural = structural_validator(check)
                .ok_or_else(|| anyhow::anyhow!("unknown structural check '{}'", check))?;
            attestation = attestation.with_structural_validator(structural);
        }

        tracing::info!(
            kind = %agent.kind,
            issuer = %agent.issuer_id,
            credential_type = attestation.credential_type(),
            "attestation agent ready"
        );
        dispatcher = dispatcher.with_attestation(Arc::new(attestation));
    }
    if config.agents.is_empty() {
        tracing::warn!("no attestation agents configured; serving decisions and verification only");
    }

    Ok(Arc::new(AppState::new(Arc::new(dispatcher), registry)))
}

fn build_validator(config: &TrustHubConfig) -> Result<Arc<dyn SemanticValidator>> {
    let validator: Arc<dyn SemanticValidator> = match config.validator.kind {
        ValidatorKind::Static => {
            tracing::warn!("static semantic validator configured");
            if config.validator.static_valid {
                Arc::new(StaticValidator::approving(&config.validator.static_reason))
            } else {
                Arc::new(StaticValidator::flagging(&config.validator.static_reason))
            }
        }
        ValidatorKind::Http => {
            let endpoint = config.validator.endpoint.as_deref().ok_or_else(|| {
                anyhow::anyhow!("validator.endpoint is required for kind = \"http\"")
            })?;
            Arc::new(HttpSemanticValidator::new(
                endpoint,
                Duration::from_millis(config.validator.timeout_ms),
            )?)
        }
    };
    Ok(validator)
}

/// Read the base64 Ed25519 seed file.
pub fn load_keypair(path: &Path) -> Result<KeyPair> {
    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("reading signing seed {}", path.display()))?;
    let keypair = KeyPair::from_base64(&encoded)
        .with_context(|| format!("decoding signing seed {}", path.display()))?;
    Ok(keypair)
}

/// Write a seed file readable only by the owner.
pub fn save_keypair(path: &Path, keypair: &KeyPair) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, keypair.to_base64())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
