//! Prior-authorization agent.
//!
//! Approves a request only when the presented credential verifies against
//! the trust registry and the configured policy accepts it. Every other path
//! ends in `Denied`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_core::{timestamp, ClaimMap};
use trusthub_credentials::CredentialVerifier;
use uuid::Uuid;

use crate::collaborators::{AcceptVerified, AuthorizationPolicy};
use crate::dispatch::METHOD_DECIDE;
use crate::error::{ErrorCode, ServiceError};
use crate::ledger::{
    default_ttl, transaction_id, InputSummary, LedgerError, LedgerRecord, LedgerStore,
};

pub const MISSING_CREDENTIAL_REASON: &str = "Missing Verifiable Credential";
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    Approved,
    Denied,
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("Approved"),
            Self::Denied => f.write_str("Denied"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    #[serde(alias = "provider_id", alias = "tenant_id")]
    pub tenant_id: String,
    /// The presented credential, undecoded. `null` and absent are the same.
    #[serde(default, alias = "verifiable_credential")]
    pub credential: Option<Value>,
    #[serde(default)]
    pub context: Value,
    #[serde(default, alias = "request_id", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub decision_id: String,
    pub outcome: DecisionOutcome,
    pub reason: String,
    /// Taxonomy code for denials caused by a missing or rejected credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AuthorizationDecision {
    fn denied(
        decision_id: String,
        reason: impl Into<String>,
        code: Option<ErrorCode>,
        credential_ref: Option<String>,
    ) -> Self {
        Self {
            decision_id,
            outcome: DecisionOutcome::Denied,
            reason: reason.into(),
            code,
            credential_ref,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.outcome == DecisionOutcome::Approved
    }
}

pub struct AuthorizationDecisionService {
    verifier: Arc<CredentialVerifier>,
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<dyn AuthorizationPolicy>,
    validity: Duration,
    ledger_ttl: Duration,
}

impl AuthorizationDecisionService {
    pub fn new(verifier: Arc<CredentialVerifier>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            verifier,
            ledger,
            policy: Arc::new(AcceptVerified),
            validity: Duration::days(DEFAULT_VALIDITY_DAYS),
            ledger_ttl: default_ttl(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Length of the approval window.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_ledger_ttl(mut self, ttl: Duration) -> Self {
        self.ledger_ttl = ttl;
        self
    }

    pub async fn decide(&self, req: DecideRequest) -> Result<AuthorizationDecision, ServiceError> {
        let summary = input_summary(&req)?;
        let decision_id = match &req.request_id {
            Some(request_id) => transaction_id(METHOD_DECIDE, &req.tenant_id, request_id),
            None => format!("urn:uuid:{}", Uuid::now_v7()),
        };

        if let Some(request_id) = &req.request_id {
            if let Some(existing) = self.ledger.get(&req.tenant_id, &decision_id).await? {
                tracing::info!(
                    tenant = %req.tenant_id,
                    decision_id = %decision_id,
                    "replaying recorded decision"
                );
                return replay(existing, request_id, &summary);
            }
        }

        let decision = self.evaluate(decision_id, &req);
        let record = self.record_for(&req, &decision, summary.clone())?;

        match self.ledger.put(&record).await {
            Ok(_) => {}
            Err(LedgerError::Conflict { .. }) if req.request_id.is_some() => {
                let request_id = req.request_id.as_deref().unwrap_or_default();
                let stored = self.ledger.get(&req.tenant_id, &decision.decision_id).await?;
                if let Some(existing) = stored {
                    return replay(existing, request_id, &summary);
                }
                return Err(ServiceError::Internal(format!(
                    "ledger conflict on {} without a stored record",
                    decision.decision_id
                )));
            }
            Err(e) if decision.is_approved() => {
                tracing::error!(
                    tenant = %req.tenant_id,
                    decision_id = %decision.decision_id,
                    error = %e,
                    "ledger write failed, approval withheld"
                );
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(
                    tenant = %req.tenant_id,
                    decision_id = %decision.decision_id,
                    error = %e,
                    "denial not recorded"
                );
            }
        }

        tracing::info!(
            tenant = %req.tenant_id,
            decision_id = %decision.decision_id,
            outcome = %decision.outcome,
            reason = %decision.reason,
            "authorization decided"
        );
        Ok(decision)
    }

    fn evaluate(&self, decision_id: String, req: &DecideRequest) -> AuthorizationDecision {
        let presented = match &req.credential {
            None | Some(Value::Null) => {
                return AuthorizationDecision::denied(
                    decision_id,
                    MISSING_CREDENTIAL_REASON,
                    Some(ErrorCode::MissingCredential),
                    None,
                );
            }
            Some(value) => value,
        };

        let (credential, verified) = match self.verifier.verify_json(presented) {
            Ok(ok) => ok,
            Err(rejection) => {
                let credential_ref = presented
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return AuthorizationDecision::denied(
                    decision_id,
                    rejection.code(),
                    Some(ErrorCode::from(&rejection)),
                    credential_ref,
                );
            }
        };

        if let Err(reason) = self.policy.evaluate(&credential, &req.context) {
            return AuthorizationDecision::denied(
                decision_id,
                reason,
                None,
                Some(verified.credential_id),
            );
        }

        let valid_from = timestamp::now();
        AuthorizationDecision {
            decision_id,
            outcome: DecisionOutcome::Approved,
            reason: format!("Credential verified from {}", verified.issuer),
            code: None,
            credential_ref: Some(verified.credential_id),
            valid_from: Some(valid_from),
            valid_until: Some(valid_from + self.validity),
        }
    }

    fn record_for(
        &self,
        req: &DecideRequest,
        decision: &AuthorizationDecision,
        summary: InputSummary,
    ) -> Result<LedgerRecord, ServiceError> {
        let payload = serde_json::to_value(decision).map_err(LedgerError::from)?;

        Ok(LedgerRecord::new(
            req.tenant_id.as_str(),
            decision.decision_id.as_str(),
            METHOD_DECIDE,
            summary,
            decision.outcome.to_string(),
            payload,
            self.ledger_ttl,
        ))
    }
}

/// Digest over the presented credential and the request context.
fn input_summary(req: &DecideRequest) -> Result<InputSummary, ServiceError> {
    let mut input = ClaimMap::new();
    input.insert(
        "credential".into(),
        req.credential.clone().unwrap_or(Value::Null),
    );
    input.insert("context".into(), req.context.clone());
    InputSummary::of(&input).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn replay(
    record: LedgerRecord,
    request_id: &str,
    input: &InputSummary,
) -> Result<AuthorizationDecision, ServiceError> {
    if !record.answers(METHOD_DECIDE, input) {
        tracing::warn!(
            tenant = %record.tenant_id,
            request_id,
            recorded_method = %record.method,
            "request id reused with different input"
        );
        return Err(ServiceError::RequestConflict {
            method: METHOD_DECIDE.to_string(),
            request_id: request_id.to_string(),
        });
    }
    Ok(serde_json::from_value(record.payload).map_err(LedgerError::from)?)
}
