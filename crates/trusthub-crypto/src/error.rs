/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("malformed proof encoding: {0}")]
    MalformedProofEncoding(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,
}
