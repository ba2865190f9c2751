//! Collaborator seams.
//!
//! The hub does not judge clinical content itself. Semantic validation,
//! structural pre-checks and authorization criteria are supplied by the
//! embedding application through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_core::{ClaimMap, Credential};

/// Verdict returned by a semantic validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    pub valid: bool,
    pub reason: String,
}

impl Judgment {
    pub fn valid(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// Semantic validator failures. Every variant aborts issuance.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidatorError {
    #[error("validator unreachable: {0}")]
    Unavailable(String),

    #[error("validator timed out")]
    Timeout,

    #[error("validator returned HTTP {0}")]
    Status(u16),

    #[error("validator reply not understood: {0}")]
    InvalidResponse(String),
}

/// Judges whether a claim bundle satisfies a policy context.
///
/// Claims arrive with PHI already masked.
#[async_trait]
pub trait SemanticValidator: Send + Sync {
    async fn evaluate(
        &self,
        claims: &ClaimMap,
        policy_context: &Value,
    ) -> Result<Judgment, ValidatorError>;
}

/// Validator with a fixed answer. Used in demo mode and tests.
#[derive(Debug, Clone)]
pub struct StaticValidator {
    answer: Result<Judgment, ValidatorError>,
}

impl StaticValidator {
    pub fn approving(reason: impl Into<String>) -> Self {
        Self {
            answer: Ok(Judgment::valid(reason)),
        }
    }

    pub fn flagging(reason: impl Into<String>) -> Self {
        Self {
            answer: Ok(Judgment::invalid(reason)),
        }
    }

    /// A validator that always fails, as an unreachable upstream would.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            answer: Err(ValidatorError::Unavailable(detail.into())),
        }
    }
}

#[async_trait]
impl SemanticValidator for StaticValidator {
    async fn evaluate(
        &self,
        _claims: &ClaimMap,
        _policy_context: &Value,
    ) -> Result<Judgment, ValidatorError> {
        self.answer.clone()
    }
}

/// Synchronous shape check run before the semantic validator.
pub trait StructuralValidator: Send + Sync {
    fn check(&self, claims: &ClaimMap) -> Result<(), String>;
}

/// Clinical criteria applied to a credential that already verified.
///
/// `Err` carries the denial reason.
pub trait AuthorizationPolicy: Send + Sync {
    fn evaluate(&self, credential: &Credential, context: &Value) -> Result<(), String>;
}

/// Approves every verified credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptVerified;

impl AuthorizationPolicy for AcceptVerified {
    fn evaluate(&self, _credential: &Credential, _context: &Value) -> Result<(), String> {
        Ok(())
    }
}

/// Denies credentials whose subject is not marked `Compliant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireCompliantStatus;

impl AuthorizationPolicy for RequireCompliantStatus {
    fn evaluate(&self, credential: &Credential, _context: &Value) -> Result<(), String> {
        match credential.claim("complianceStatus").and_then(Value::as_str) {
            Some("Compliant") => Ok(()),
            Some(other) => Err(format!("Attestation status is {other}")),
            None => Err("Attestation carries no compliance status".into()),
        }
    }
}
