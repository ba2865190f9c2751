use trusthub_identity::RegistryError;

/// Credential issuance errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("signing key does not match the registered public key for {0}")]
    KeyMismatch(String),

    #[error("issuance failed: {0}")]
    Canonicalization(#[from] trusthub_core::CoreError),
}

/// Why a presented credential was not accepted.
///
/// Rejections are ordinary values: an untrusted or malformed credential is
/// expected input, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("issuer {0} is not in the trust registry")]
    UnknownIssuer(String),

    #[error("unsupported proof type: {0}")]
    UnsupportedProofType(String),

    #[error("verification method {found} does not match registered {expected}")]
    VerificationMethodMismatch { expected: String, found: String },

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("malformed proof encoding: {0}")]
    MalformedProofEncoding(String),
}

impl Rejection {
    /// Stable taxonomy code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownIssuer(_) => "UnknownIssuer",
            Self::UnsupportedProofType(_) => "UnsupportedProofType",
            Self::VerificationMethodMismatch { .. } => "VerificationMethodMismatch",
            Self::SignatureInvalid(_) => "SignatureInvalid",
            Self::MalformedProofEncoding(_) => "MalformedProofEncoding",
        }
    }
}
