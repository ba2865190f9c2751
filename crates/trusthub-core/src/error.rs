/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("credential {0} already carries a proof")]
    ProofPresent(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] serde_json::Error),
}
