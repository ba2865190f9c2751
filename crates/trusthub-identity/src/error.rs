/// Trust registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("duplicate issuer in registry: {0}")]
    DuplicateIssuer(String),

    #[error("invalid public key for issuer {issuer}: {source}")]
    InvalidPublicKey {
        issuer: String,
        #[source]
        source: trusthub_crypto::CryptoError,
    },

    #[error("invalid issuer entry: {0}")]
    InvalidEntry(String),
}
