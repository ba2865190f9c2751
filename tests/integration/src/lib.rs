//! Shared fixtures for the cross-crate scenarios.

use std::sync::Arc;

use serde_json::Value;
use trusthub_agents::{
    AttestationService, AuthorizationDecisionService, Dispatcher, InMemoryLedger,
    SemanticValidator,
};
use trusthub_core::ClaimMap;
use trusthub_credentials::{CredentialIssuer, CredentialVerifier};
use trusthub_crypto::KeyPair;
use trusthub_identity::{IssuerRecord, IssuerRole, TrustRegistry};

pub const CMS_AUTHORITY: &str = "cms-authority";
pub const LAB: &str = "lab-v1";

/// One issuer identity wired behind a dispatcher with an in-memory ledger.
///
/// The hub's registry holds only its own issuer.
pub struct Hub {
    pub registry: Arc<TrustRegistry>,
    pub issuer: Arc<CredentialIssuer>,
    pub ledger: Arc<InMemoryLedger>,
    pub dispatcher: Dispatcher,
}

impl Hub {
    pub fn new(validator: Arc<dyn SemanticValidator>) -> Self {
        Self::with_issuer(CMS_AUTHORITY, validator)
    }

    pub fn with_issuer(issuer_id: &str, validator: Arc<dyn SemanticValidator>) -> Self {
        let keypair = KeyPair::generate();
        let registry = Arc::new(
            TrustRegistry::from_records(vec![IssuerRecord::new(
                issuer_id,
                keypair.public_key(),
                IssuerRole::AttestationAuthority,
            )])
            .expect("registry"),
        );
        let issuer =
            Arc::new(CredentialIssuer::new(issuer_id, keypair, &registry).expect("issuer"));
        let verifier = Arc::new(CredentialVerifier::new(registry.clone()));
        let ledger = Arc::new(InMemoryLedger::new());

        let attestation = AttestationService::new(issuer.clone(), validator, ledger.clone());
        let authorization = AuthorizationDecisionService::new(verifier.clone(), ledger.clone());
        let dispatcher = Dispatcher::new(Arc::new(authorization), verifier)
            .with_attestation(Arc::new(attestation));

        Self {
            registry,
            issuer,
            ledger,
            dispatcher,
        }
    }
}

/// Build a claim map from a JSON object literal.
pub fn claims(value: Value) -> ClaimMap {
    match value {
        Value::Object(map) => map,
        other => panic!("claims must be a JSON object, got {other}"),
    }
}

/// Build a registry from records and one `CredentialIssuer` per signing key.
pub fn parties(
    members: Vec<(IssuerRecord, KeyPair)>,
) -> (Arc<TrustRegistry>, Vec<CredentialIssuer>) {
    let registry = Arc::new(
        TrustRegistry::from_records(members.iter().map(|(record, _)| record.clone()))
            .expect("registry"),
    );
    let issuers = members
        .into_iter()
        .map(|(record, keypair)| {
            CredentialIssuer::new(record.id.clone(), keypair, &registry).expect("issuer")
        })
        .collect();
    (registry, issuers)
}
