//! # Canonical Encoding
//!
//! Produces the exact bytes that get signed and verified. Serialization
//! follows RFC 8785 (JSON Canonicalization Scheme): object keys sorted at
//! every depth, compact separators, ECMAScript number formatting. The
//! in-memory insertion order of claims therefore never reaches the output.
//!
//! The signable content is every field of the credential except `proof`.
//! `encode` refuses a credential that already carries a proof so a signature
//! can never end up covering itself.

use serde::Serialize;

use crate::credential::Credential;
use crate::error::CoreError;

/// Bytes produced by JCS canonicalization.
///
/// The inner buffer is private; values are only created by [`encode`] or
/// [`CanonicalBytes::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// Credentials must go through [`encode`] instead, which enforces the
    /// proof exclusion rule.
    pub fn new(value: &impl Serialize) -> Result<Self, CoreError> {
        Ok(Self(serde_jcs::to_vec(value)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode the signable content of an unsigned credential.
pub fn encode(credential: &Credential) -> Result<CanonicalBytes, CoreError> {
    if credential.proof.is_some() {
        return Err(CoreError::ProofPresent(credential.id.clone()));
    }
    CanonicalBytes::new(credential)
}
