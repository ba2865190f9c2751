use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use trusthub_crypto::PublicKey;

use crate::error::RegistryError;

/// Role an issuer plays in the healthcare agent network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerRole {
    /// Regulatory attestation authority (e.g. CMS).
    AttestationAuthority,
    HealthcareProvider,
    HealthInsurer,
    PharmacyBenefitManager,
    DiagnosticLab,
    RegulatoryAuditor,
    CredentialingBody,
    PatientProxy,
    ClinicalResearch,
    Clearinghouse,
}

impl fmt::Display for IssuerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AttestationAuthority => "attestation_authority",
            Self::HealthcareProvider => "healthcare_provider",
            Self::HealthInsurer => "health_insurer",
            Self::PharmacyBenefitManager => "pharmacy_benefit_manager",
            Self::DiagnosticLab => "diagnostic_lab",
            Self::RegulatoryAuditor => "regulatory_auditor",
            Self::CredentialingBody => "credentialing_body",
            Self::PatientProxy => "patient_proxy",
            Self::ClinicalResearch => "clinical_research",
            Self::Clearinghouse => "clearinghouse",
        };
        f.write_str(s)
    }
}

/// One issuer as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerEntry {
    /// Issuer identifier (DID-like URI).
    pub id: String,
    /// Ed25519 public key, standard base64.
    pub public_key: String,
    /// Verification method id; defaults to `<id>#key-1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    pub role: IssuerRole,
    #[serde(default)]
    pub display_name: String,
    /// Service endpoint advertised for the issuer's agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// A resolved, immutable issuer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerRecord {
    pub id: String,
    pub public_key: PublicKey,
    pub verification_method: String,
    pub role: IssuerRole,
    pub display_name: String,
    pub endpoint: Option<String>,
}

impl IssuerRecord {
    /// Build a record with the default `#key-1` verification method.
    pub fn new(id: impl Into<String>, public_key: PublicKey, role: IssuerRole) -> Self {
        let id = id.into();
        Self {
            verification_method: default_verification_method(&id),
            display_name: id.clone(),
            id,
            public_key,
            role,
            endpoint: None,
        }
    }

    pub fn with_verification_method(mut self, verification_method: impl Into<String>) -> Self {
        self.verification_method = verification_method.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Convert back into the configuration representation.
    pub fn to_entry(&self) -> IssuerEntry {
        IssuerEntry {
            id: self.id.clone(),
            public_key: self.public_key.to_base64(),
            verification_method: Some(self.verification_method.clone()),
            role: self.role,
            display_name: self.display_name.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl TryFrom<IssuerEntry> for IssuerRecord {
    type Error = RegistryError;

    fn try_from(entry: IssuerEntry) -> Result<Self, Self::Error> {
        if entry.id.trim().is_empty() {
            return Err(RegistryError::InvalidEntry("issuer id is empty".into()));
        }
        let public_key = PublicKey::from_base64(&entry.public_key).map_err(|source| {
            RegistryError::InvalidPublicKey {
                issuer: entry.id.clone(),
                source,
            }
        })?;
        let verification_method = entry
            .verification_method
            .unwrap_or_else(|| default_verification_method(&entry.id));
        let display_name = if entry.display_name.is_empty() {
            entry.id.clone()
        } else {
            entry.display_name
        };

        Ok(Self {
            id: entry.id,
            public_key,
            verification_method,
            role: entry.role,
            display_name,
            endpoint: entry.endpoint,
        })
    }
}

fn default_verification_method(id: &str) -> String {
    format!("{}#key-1", id)
}

/// Authoritative issuer id → record mapping.
///
/// Built once; there are no mutating methods, so an `Arc<TrustRegistry>` can
/// be read from any number of threads without locking.
#[derive(Debug, Clone, Default)]
pub struct TrustRegistry {
    issuers: HashMap<String, IssuerRecord>,
}

impl TrustRegistry {
    /// Build a registry from resolved records. Duplicate ids are rejected.
    pub fn from_records(
        records: impl IntoIterator<Item = IssuerRecord>,
    ) -> Result<Self, RegistryError> {
        let mut issuers = HashMap::new();
        for record in records {
            if issuers.contains_key(&record.id) {
                return Err(RegistryError::DuplicateIssuer(record.id));
            }
            issuers.insert(record.id.clone(), record);
        }
        tracing::info!(issuers = issuers.len(), "trust registry loaded");
        Ok(Self { issuers })
    }

    /// Build a registry from configuration entries.
    pub fn from_entries(
        entries: impl IntoIterator<Item = IssuerEntry>,
    ) -> Result<Self, RegistryError> {
        let records = entries
            .into_iter()
            .map(IssuerRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    /// Resolve an issuer identifier.
    pub fn resolve(&self, issuer_id: &str) -> Result<&IssuerRecord, RegistryError> {
        self.issuers
            .get(issuer_id)
            .ok_or_else(|| RegistryError::UnknownIssuer(issuer_id.to_string()))
    }

    /// Check if an issuer is registered.
    pub fn contains(&self, issuer_id: &str) -> bool {
        self.issuers.contains_key(issuer_id)
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }

    /// Iterate over records in issuer id order.
    pub fn iter(&self) -> impl Iterator<Item = &IssuerRecord> {
        let mut records: Vec<&IssuerRecord> = self.issuers.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records.into_iter()
    }
}
