use std::fmt;

use serde::{Deserialize, Serialize};
use trusthub_credentials::{CredentialError, Rejection};

use crate::ledger::LedgerError;

/// Error taxonomy shared by every operation the hub exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownIssuer,
    UnsupportedProofType,
    VerificationMethodMismatch,
    SignatureInvalid,
    MalformedProofEncoding,
    MissingCredential,
    UpstreamUnavailable,
    StructuralValidationFailed,
    /// A request id was reused for a different request.
    RequestConflict,
    /// The method exists but this hub has no agent configured for it.
    MethodNotAvailable,
    /// The request body could not be decoded.
    InvalidRequest,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownIssuer => "UnknownIssuer",
            Self::UnsupportedProofType => "UnsupportedProofType",
            Self::VerificationMethodMismatch => "VerificationMethodMismatch",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::MalformedProofEncoding => "MalformedProofEncoding",
            Self::MissingCredential => "MissingCredential",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::StructuralValidationFailed => "StructuralValidationFailed",
            Self::RequestConflict => "RequestConflict",
            Self::MethodNotAvailable => "MethodNotAvailable",
            Self::InvalidRequest => "InvalidRequest",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Rejection> for ErrorCode {
    fn from(rejection: &Rejection) -> Self {
        match rejection {
            Rejection::UnknownIssuer(_) => Self::UnknownIssuer,
            Rejection::UnsupportedProofType(_) => Self::UnsupportedProofType,
            Rejection::VerificationMethodMismatch { .. } => Self::VerificationMethodMismatch,
            Rejection::SignatureInvalid(_) => Self::SignatureInvalid,
            Rejection::MalformedProofEncoding(_) => Self::MalformedProofEncoding,
        }
    }
}

/// Service-level failures. Verification failures are not errors here; they
/// become `Denied` decisions or `{ok: false}` outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("semantic validator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("structural validation failed: {0}")]
    StructuralValidationFailed(String),

    #[error("request id {request_id} was already used for a different {method} request")]
    RequestConflict { method: String, request_id: String },

    #[error("no agent configured for {0}")]
    MethodNotAvailable(String),

    #[error("credential issuance failed: {0}")]
    Issuance(#[from] CredentialError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            Self::StructuralValidationFailed(_) => ErrorCode::StructuralValidationFailed,
            Self::RequestConflict { .. } => ErrorCode::RequestConflict,
            Self::MethodNotAvailable(_) => ErrorCode::MethodNotAvailable,
            Self::Issuance(_) | Self::Ledger(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}
