use std::sync::Arc;

use trusthub_core::{canonical, Credential, ED25519_SIGNATURE_2020};
use trusthub_crypto::{verify, Signature};
use trusthub_identity::{IssuerRole, TrustRegistry};

use crate::error::Rejection;

/// Proof types this verifier accepts.
const SUPPORTED_PROOF_TYPES: &[&str] = &[ED25519_SIGNATURE_2020];

/// Facts established by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub credential_id: String,
    pub issuer: String,
    pub role: IssuerRole,
    pub verification_method: String,
}

/// Verifies credentials against an immutable trust registry snapshot.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    registry: Arc<TrustRegistry>,
}

impl CredentialVerifier {
    /// Create a new credential verifier.
    pub fn new(registry: Arc<TrustRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TrustRegistry {
        &self.registry
    }

    /// Verify a credential. Checks run in a fixed order and stop at the first
    /// failure: issuer, proof type, verification method, signature.
    pub fn verify(&self, credential: &Credential) -> Result<Verified, Rejection> {
        let result = self.check(credential);
        match &result {
            Ok(_) => tracing::debug!(
                credential_id = %credential.id,
                issuer = %credential.issuer,
                "credential verified"
            ),
            Err(rejection) => tracing::warn!(
                credential_id = %credential.id,
                issuer = %credential.issuer,
                code = rejection.code(),
                reason = %rejection,
                "credential rejected"
            ),
        }
        result
    }

    /// Decode an untrusted JSON document and verify it.
    ///
    /// A document that does not have the credential shape is reported as
    /// `MalformedProofEncoding`.
    pub fn verify_json(
        &self,
        value: &serde_json::Value,
    ) -> Result<(Credential, Verified), Rejection> {
        let credential: Credential = serde_json::from_value(value.clone()).map_err(|e| {
            tracing::warn!(error = %e, "presented credential is not decodable");
            Rejection::MalformedProofEncoding(e.to_string())
        })?;
        let verified = self.verify(&credential)?;
        Ok((credential, verified))
    }

    fn check(&self, credential: &Credential) -> Result<Verified, Rejection> {
        // 1. Issuer must be registered.
        let record = self
            .registry
            .resolve(&credential.issuer)
            .map_err(|_| Rejection::UnknownIssuer(credential.issuer.clone()))?;

        // 2. Proof must exist and use a supported scheme.
        let proof = credential.proof.as_ref().ok_or_else(|| {
            Rejection::MalformedProofEncoding("credential carries no proof".into())
        })?;
        if !SUPPORTED_PROOF_TYPES.contains(&proof.proof_type.as_str()) {
            return Err(Rejection::UnsupportedProofType(proof.proof_type.clone()));
        }

        // 3. Proof must name the issuer's registered verification method.
        if proof.verification_method != record.verification_method {
            return Err(Rejection::VerificationMethodMismatch {
                expected: record.verification_method.clone(),
                found: proof.verification_method.clone(),
            });
        }

        // 4. Recompute the signed payload without the proof.
        let payload = canonical::encode(&credential.without_proof())
            .map_err(|e| Rejection::MalformedProofEncoding(e.to_string()))?;
        let signature = Signature::from_base64url(&proof.signature_value)
            .map_err(|e| Rejection::SignatureInvalid(e.to_string()))?;

        // 5. Ed25519 check against the registered key.
        verify(payload.as_bytes(), &signature, &record.public_key)
            .map_err(|e| Rejection::SignatureInvalid(e.to_string()))?;

        Ok(Verified {
            credential_id: credential.id.clone(),
            issuer: record.id.clone(),
            role: record.role,
            verification_method: record.verification_method.clone(),
        })
    }
}
