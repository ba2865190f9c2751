//! Attestation agents.
//!
//! Turn a claim bundle plus an external semantic judgment into a signed
//! attestation credential and record the transaction. One service runs per
//! [`AttestationKind`]; each kind has its own method name, credential type
//! and ledger id space.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_core::{ClaimMap, Credential};
use trusthub_credentials::CredentialIssuer;
use trusthub_identity::IssuerRole;
use uuid::Uuid;

use crate::collaborators::{Judgment, SemanticValidator, StructuralValidator};
use crate::dispatch::{METHOD_ATTEST, METHOD_ATTEST_DIAGNOSTIC, METHOD_ATTEST_MEDICATION};
use crate::error::ServiceError;
use crate::ledger::{
    default_ttl, transaction_id, InputSummary, LedgerError, LedgerRecord, LedgerStore,
};
use crate::privacy;

pub const ATTESTATION_CREDENTIAL: &str = "HealthcareAttestationCredential";
pub const DIAGNOSTIC_CREDENTIAL: &str = "DiagnosticAttestationCredential";
pub const MEDICATION_CREDENTIAL: &str = "MedicationAttestationCredential";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationKind {
    /// Healthcare data attested by the regulatory authority.
    Healthcare,
    /// Lab results.
    Diagnostic,
    /// Pharmacy benefit medication requests.
    Medication,
}

impl AttestationKind {
    pub const ALL: [Self; 3] = [Self::Healthcare, Self::Diagnostic, Self::Medication];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthcare => "healthcare",
            Self::Diagnostic => "diagnostic",
            Self::Medication => "medication",
        }
    }

    /// Dispatcher method that reaches this kind of agent.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Healthcare => METHOD_ATTEST,
            Self::Diagnostic => METHOD_ATTEST_DIAGNOSTIC,
            Self::Medication => METHOD_ATTEST_MEDICATION,
        }
    }

    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }

    pub fn credential_type(&self) -> &'static str {
        match self {
            Self::Healthcare => ATTESTATION_CREDENTIAL,
            Self::Diagnostic => DIAGNOSTIC_CREDENTIAL,
            Self::Medication => MEDICATION_CREDENTIAL,
        }
    }

    /// `attestationType` claim used when the request does not name one.
    pub fn default_attestation_type(&self) -> &'static str {
        match self {
            Self::Healthcare => "HealthcareDataValidation",
            Self::Diagnostic => "LabResult",
            Self::Medication => "MedicationRequest",
        }
    }

    /// Built-in structural check (see [`crate::schema::structural_validator`]).
    pub fn default_structural_check(&self) -> Option<&'static str> {
        match self {
            Self::Healthcare => None,
            Self::Diagnostic => Some("lab-diagnostic-v1"),
            Self::Medication => Some("pbm-medication-v1"),
        }
    }

    /// Registry role of the identity signing for this kind.
    pub fn issuer_role(&self) -> IssuerRole {
        match self {
            Self::Healthcare => IssuerRole::AttestationAuthority,
            Self::Diagnostic => IssuerRole::DiagnosticLab,
            Self::Medication => IssuerRole::PharmacyBenefitManager,
        }
    }
}

impl fmt::Display for AttestationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttestationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown attestation kind: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceStatus {
    Compliant,
    Flagged,
}

impl ComplianceStatus {
    fn from_judgment(judgment: &Judgment) -> Self {
        if judgment.valid {
            Self::Compliant
        } else {
            Self::Flagged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "Compliant",
            Self::Flagged => "Flagged",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Compliant" => Ok(Self::Compliant),
            "Flagged" => Ok(Self::Flagged),
            other => Err(format!("unknown compliance status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestRequest {
    #[serde(alias = "provider_id", alias = "tenant_id")]
    pub tenant_id: String,
    pub claims: ClaimMap,
    #[serde(default, alias = "policy_context")]
    pub policy_context: Value,
    /// Caller-chosen transaction id. Retries with the same id and the same
    /// input replay the first result.
    #[serde(default, alias = "request_id", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResult {
    pub attestation_id: String,
    pub status: ComplianceStatus,
    pub credential: Credential,
}

pub struct AttestationService {
    kind: AttestationKind,
    credential_type: String,
    issuer: Arc<CredentialIssuer>,
    validator: Arc<dyn SemanticValidator>,
    ledger: Arc<dyn LedgerStore>,
    structural: Option<Arc<dyn StructuralValidator>>,
    ledger_ttl: Duration,
}

impl AttestationService {
    /// A healthcare attestation agent. Use [`Self::with_kind`] for the others.
    pub fn new(
        issuer: Arc<CredentialIssuer>,
        validator: Arc<dyn SemanticValidator>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        let kind = AttestationKind::Healthcare;
        Self {
            kind,
            credential_type: kind.credential_type().to_string(),
            issuer,
            validator,
            ledger,
            structural: None,
            ledger_ttl: default_ttl(),
        }
    }

    /// Switch kind. Resets the credential type to the kind's default.
    pub fn with_kind(mut self, kind: AttestationKind) -> Self {
        self.kind = kind;
        self.credential_type = kind.credential_type().to_string();
        self
    }

    pub fn with_credential_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = credential_type.into();
        self
    }

    pub fn with_structural_validator(mut self, structural: Arc<dyn StructuralValidator>) -> Self {
        self.structural = Some(structural);
        self
    }

    pub fn with_ledger_ttl(mut self, ttl: Duration) -> Self {
        self.ledger_ttl = ttl;
        self
    }

    pub fn kind(&self) -> AttestationKind {
        self.kind
    }

    pub fn credential_type(&self) -> &str {
        &self.credential_type
    }

    pub fn issuer_id(&self) -> &str {
        self.issuer.issuer_id()
    }

    /// Validate, sign and record one attestation.
    ///
    /// Nothing is issued or written unless the semantic validator answers.
    pub async fn attest(&self, req: AttestRequest) -> Result<AttestationResult, ServiceError> {
        let method = self.kind.method();
        let summary = InputSummary::with_context(&req.claims, &req.policy_context)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let attestation_id = match &req.request_id {
            Some(request_id) => transaction_id(method, &req.tenant_id, request_id),
            None => format!("urn:uuid:{}", Uuid::now_v7()),
        };

        if let Some(request_id) = &req.request_id {
            if let Some(existing) = self.ledger.get(&req.tenant_id, &attestation_id).await? {
                tracing::info!(
                    tenant = %req.tenant_id,
                    attestation_id = %attestation_id,
                    "replaying recorded attestation"
                );
                return self.replay(existing, request_id, &summary);
            }
        }

        if let Some(structural) = &self.structural {
            structural.check(&req.claims).map_err(|reason| {
                tracing::warn!(tenant = %req.tenant_id, %reason, "claims failed structural check");
                ServiceError::StructuralValidationFailed(reason)
            })?;
        }

        let masked = privacy::mask_claims(&req.claims);
        let judgment = self
            .validator
            .evaluate(&masked, &req.policy_context)
            .await
            .map_err(|e| {
                tracing::warn!(tenant = %req.tenant_id, error = %e, "semantic validator failed");
                ServiceError::UpstreamUnavailable(e.to_string())
            })?;
        let status = ComplianceStatus::from_judgment(&judgment);

        let attestation_type = attestation_type(
            &req.claims,
            &req.policy_context,
            self.kind.default_attestation_type(),
        );
        let subject =
            subject_claims(req.claims, &req.tenant_id, &attestation_type, status, &judgment);

        let credential = self.issuer.issue_with_id(
            &attestation_id,
            vec![self.credential_type.clone()],
            subject,
        )?;

        let record = LedgerRecord::new(
            req.tenant_id.as_str(),
            attestation_id.as_str(),
            method,
            summary.clone(),
            status.as_str(),
            serde_json::to_value(&credential).map_err(LedgerError::from)?,
            self.ledger_ttl,
        );
        match self.ledger.put(&record).await {
            Ok(_) => {}
            // A concurrent retry with the same request id won the race.
            Err(LedgerError::Conflict { .. }) if req.request_id.is_some() => {
                let request_id = req.request_id.as_deref().unwrap_or_default();
                if let Some(existing) = self.ledger.get(&req.tenant_id, &attestation_id).await? {
                    return self.replay(existing, request_id, &summary);
                }
                return Err(ServiceError::Internal(format!(
                    "ledger conflict on {attestation_id} without a stored record"
                )));
            }
            Err(e) => {
                tracing::error!(
                    tenant = %req.tenant_id,
                    attestation_id = %attestation_id,
                    error = %e,
                    "ledger write failed, attestation discarded"
                );
                return Err(e.into());
            }
        }

        tracing::info!(
            tenant = %req.tenant_id,
            attestation_id = %attestation_id,
            kind = %self.kind,
            status = %status,
            "attestation issued"
        );

        Ok(AttestationResult {
            attestation_id,
            status,
            credential,
        })
    }

    /// Return a recorded result, provided it answers this exact request.
    fn replay(
        &self,
        record: LedgerRecord,
        request_id: &str,
        input: &InputSummary,
    ) -> Result<AttestationResult, ServiceError> {
        let method = self.kind.method();
        if !record.answers(method, input) {
            tracing::warn!(
                tenant = %record.tenant_id,
                request_id,
                recorded_method = %record.method,
                "request id reused with different input"
            );
            return Err(ServiceError::RequestConflict {
                method: method.to_string(),
                request_id: request_id.to_string(),
            });
        }
        let status = record
            .outcome
            .parse::<ComplianceStatus>()
            .map_err(ServiceError::Internal)?;
        let credential: Credential =
            serde_json::from_value(record.payload).map_err(LedgerError::from)?;
        Ok(AttestationResult {
            attestation_id: record.record_id,
            status,
            credential,
        })
    }
}

fn attestation_type(claims: &ClaimMap, policy_context: &Value, default: &str) -> String {
    policy_context
        .get("attestationType")
        .or_else(|| claims.get("attestation_type"))
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn subject_claims(
    mut claims: ClaimMap,
    tenant_id: &str,
    attestation_type: &str,
    status: ComplianceStatus,
    judgment: &Judgment,
) -> ClaimMap {
    claims.insert(
        "id".into(),
        Value::String(format!("did:web:provider-{tenant_id}.com")),
    );
    claims.insert(
        "attestationType".into(),
        Value::String(attestation_type.to_string()),
    );
    claims.insert(
        "complianceStatus".into(),
        Value::String(status.as_str().to_string()),
    );
    claims.insert(
        "validationReason".into(),
        Value::String(judgment.reason.clone()),
    );
    claims
}
