use trusthub_core::{
    canonical, ClaimMap, Credential, Proof, ASSERTION_METHOD, ED25519_SIGNATURE_2020,
};
use trusthub_crypto::{sign, KeyPair};
use trusthub_identity::TrustRegistry;

use crate::error::CredentialError;

/// Issues verifiable credentials signed by one issuer identity.
///
/// The key pair is injected at construction; several issuers can coexist in
/// one process, each with its own `CredentialIssuer`.
pub struct CredentialIssuer {
    /// Registry id of the issuer.
    issuer_id: String,
    /// Issuer's signing keypair.
    keypair: KeyPair,
    /// Copied from the issuer's registry record.
    verification_method: String,
}

impl CredentialIssuer {
    /// Bind a signing key to a registered issuer.
    ///
    /// Fails if the issuer is not registered or the key pair's public half is
    /// not the registered key.
    pub fn new(
        issuer_id: impl Into<String>,
        keypair: KeyPair,
        registry: &TrustRegistry,
    ) -> Result<Self, CredentialError> {
        let issuer_id = issuer_id.into();
        let record = registry.resolve(&issuer_id)?;
        if record.public_key != keypair.public_key() {
            return Err(CredentialError::KeyMismatch(issuer_id));
        }

        Ok(Self {
            verification_method: record.verification_method.clone(),
            issuer_id,
            keypair,
        })
    }

    /// Get the issuer's registry id.
    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn verification_method(&self) -> &str {
        &self.verification_method
    }

    /// Issue a credential with a freshly generated id.
    pub fn issue(
        &self,
        credential_type: Vec<String>,
        claims: ClaimMap,
    ) -> Result<Credential, CredentialError> {
        let vc = Credential::new(self.issuer_id.clone(), credential_type, claims);
        self.sign(vc)
    }

    /// Issue a credential whose id is supplied by the caller.
    pub fn issue_with_id(
        &self,
        id: &str,
        credential_type: Vec<String>,
        claims: ClaimMap,
    ) -> Result<Credential, CredentialError> {
        let vc = Credential::new(self.issuer_id.clone(), credential_type, claims).with_id(id);
        self.sign(vc)
    }

    fn sign(&self, mut vc: Credential) -> Result<Credential, CredentialError> {
        let payload = canonical::encode(&vc)?;
        let signature = sign(payload.as_bytes(), &self.keypair);

        vc.proof = Some(Proof {
            proof_type: ED25519_SIGNATURE_2020.to_string(),
            created: vc.issuance_date,
            verification_method: self.verification_method.clone(),
            proof_purpose: ASSERTION_METHOD.to_string(),
            signature_value: signature.to_base64url(),
        });

        tracing::info!(
            issuer = %self.issuer_id,
            credential_id = %vc.id,
            "credential issued"
        );

        Ok(vc)
    }
}
