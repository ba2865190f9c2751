use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// First type tag of every credential.
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";
/// The only proof scheme this protocol signs and verifies.
pub const ED25519_SIGNATURE_2020: &str = "Ed25519Signature2020";
/// Proof purpose attached to issued credentials.
pub const ASSERTION_METHOD: &str = "assertionMethod";

/// Claim name → value map carried in `credentialSubject`.
pub type ClaimMap = serde_json::Map<String, serde_json::Value>;

/// A W3C-inspired Verifiable Credential exchanged between healthcare agents.
///
/// Field names on the wire are fixed: `id`, `type`, `issuer`, `issuanceDate`,
/// `credentialSubject`, `proof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Credential {
    /// Unique credential identifier (`urn:uuid:...`).
    pub id: String,
    /// Type tags, `VerifiableCredential` first.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// Identifier of the issuer in the trust registry.
    pub issuer: String,
    /// When the credential was issued (UTC, whole seconds).
    #[serde(with = "crate::timestamp")]
    pub issuance_date: DateTime<Utc>,
    /// Subject claims.
    pub credential_subject: ClaimMap,
    /// Signature block; never part of the signed payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

/// Proof attached to a verifiable credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Proof {
    /// Signature scheme tag.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// When the proof was created.
    #[serde(with = "crate::timestamp")]
    pub created: DateTime<Utc>,
    /// Verification method of the signing issuer (e.g. "did:web:cms.gov#key-1").
    pub verification_method: String,
    /// Proof purpose tag.
    pub proof_purpose: String,
    /// Ed25519 signature, base64url without padding.
    pub signature_value: String,
}

impl Credential {
    /// Create a new unsigned credential with a fresh id and issuance date.
    pub fn new(issuer: String, credential_type: Vec<String>, claims: ClaimMap) -> Self {
        let mut types = vec![VERIFIABLE_CREDENTIAL.to_string()];
        for t in credential_type {
            if !types.contains(&t) {
                types.push(t);
            }
        }

        Self {
            id: format!("urn:uuid:{}", Uuid::now_v7()),
            credential_type: types,
            issuer,
            issuance_date: crate::timestamp::now(),
            credential_subject: claims,
            proof: None,
        }
    }

    /// Replace the generated id (used when the caller owns the transaction id).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// A copy of this credential with the proof removed.
    pub fn without_proof(&self) -> Self {
        Self {
            proof: None,
            ..self.clone()
        }
    }

    /// Check if the credential has been signed.
    pub fn is_signed(&self) -> bool {
        self.proof.is_some()
    }

    /// Look up a single subject claim.
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.credential_subject.get(name)
    }
}
