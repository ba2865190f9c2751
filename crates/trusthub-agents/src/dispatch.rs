use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_credentials::CredentialVerifier;

use crate::attestation::{AttestRequest, AttestationKind, AttestationResult, AttestationService};
use crate::authorization::{AuthorizationDecision, AuthorizationDecisionService, DecideRequest};
use crate::error::ServiceError;

pub const METHOD_ATTEST: &str = "attest_healthcare_data";
pub const METHOD_ATTEST_DIAGNOSTIC: &str = "attest_diagnostic";
pub const METHOD_ATTEST_MEDICATION: &str = "attest_medication";
pub const METHOD_DECIDE: &str = "request_prior_auth";
pub const METHOD_VERIFY: &str = "verify_credential";

/// Every method name the dispatcher understands. Attestation methods only
/// answer when an agent of that kind is configured.
pub const METHODS: &[&str] = &[
    METHOD_ATTEST,
    METHOD_ATTEST_DIAGNOSTIC,
    METHOD_ATTEST_MEDICATION,
    METHOD_DECIDE,
    METHOD_VERIFY,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "verifiable_credential")]
    pub credential: Value,
}

/// One typed request per exposed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    #[serde(rename = "attest_healthcare_data")]
    Attest(AttestRequest),
    #[serde(rename = "attest_diagnostic")]
    AttestDiagnostic(AttestRequest),
    #[serde(rename = "attest_medication")]
    AttestMedication(AttestRequest),
    #[serde(rename = "request_prior_auth")]
    Decide(DecideRequest),
    #[serde(rename = "verify_credential")]
    Verify(VerifyRequest),
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Attest(_) => METHOD_ATTEST,
            Self::AttestDiagnostic(_) => METHOD_ATTEST_DIAGNOSTIC,
            Self::AttestMedication(_) => METHOD_ATTEST_MEDICATION,
            Self::Decide(_) => METHOD_DECIDE,
            Self::Verify(_) => METHOD_VERIFY,
        }
    }

    /// Build a request from a method name and its JSON params.
    pub fn from_parts(method: &str, params: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "method": method, "params": params }))
    }
}

/// Result of a bare verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub ok: bool,
    /// `"Verified"` or the rejection code.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Attestation(AttestationResult),
    Decision(AuthorizationDecision),
    Verification(VerifyOutcome),
}

/// Routes typed requests to the agents.
pub struct Dispatcher {
    attestations: HashMap<AttestationKind, Arc<AttestationService>>,
    authorization: Arc<AuthorizationDecisionService>,
    verifier: Arc<CredentialVerifier>,
}

impl Dispatcher {
    /// A dispatcher with no attestation agents; add them with
    /// [`Self::with_attestation`].
    pub fn new(
        authorization: Arc<AuthorizationDecisionService>,
        verifier: Arc<CredentialVerifier>,
    ) -> Self {
        Self {
            attestations: HashMap::new(),
            authorization,
            verifier,
        }
    }

    /// Register an attestation agent under its kind, replacing any previous
    /// agent of the same kind.
    pub fn with_attestation(mut self, service: Arc<AttestationService>) -> Self {
        self.attestations.insert(service.kind(), service);
        self
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// Configured attestation kinds with their signing identities.
    pub fn attestation_agents(&self) -> Vec<(AttestationKind, String)> {
        let mut agents: Vec<_> = self
            .attestations
            .iter()
            .map(|(kind, service)| (*kind, service.issuer_id().to_string()))
            .collect();
        agents.sort_by_key(|(kind, _)| kind.as_str());
        agents
    }

    /// Whether `method` names an operation this dispatcher can serve.
    pub fn supports(&self, method: &str) -> bool {
        match AttestationKind::from_method(method) {
            Some(kind) => self.attestations.contains_key(&kind),
            None => METHODS.contains(&method),
        }
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response, ServiceError> {
        tracing::debug!(method = request.method(), "dispatching request");
        match request {
            Request::Attest(req) => self.attest(req).await.map(Response::Attestation),
            Request::AttestDiagnostic(req) => self
                .attest_as(AttestationKind::Diagnostic, req)
                .await
                .map(Response::Attestation),
            Request::AttestMedication(req) => self
                .attest_as(AttestationKind::Medication, req)
                .await
                .map(Response::Attestation),
            Request::Decide(req) => self.decide(req).await.map(Response::Decision),
            Request::Verify(req) => Ok(Response::Verification(self.verify(&req.credential))),
        }
    }

    /// Healthcare data attestation.
    pub async fn attest(&self, req: AttestRequest) -> Result<AttestationResult, ServiceError> {
        self.attest_as(AttestationKind::Healthcare, req).await
    }

    pub async fn attest_as(
        &self,
        kind: AttestationKind,
        req: AttestRequest,
    ) -> Result<AttestationResult, ServiceError> {
        let service = self
            .attestations
            .get(&kind)
            .ok_or_else(|| ServiceError::MethodNotAvailable(kind.method().to_string()))?;
        service.attest(req).await
    }

    pub async fn decide(&self, req: DecideRequest) -> Result<AuthorizationDecision, ServiceError> {
        self.authorization.decide(req).await
    }

    /// Verify a presented credential. Never fails; rejections are reported in
    /// the outcome.
    pub fn verify(&self, credential: &Value) -> VerifyOutcome {
        match self.verifier.verify_json(credential) {
            Ok((_, verified)) => VerifyOutcome {
                ok: true,
                reason: "Verified".into(),
                issuer: Some(verified.issuer),
            },
            Err(rejection) => VerifyOutcome {
                ok: false,
                reason: rejection.code().to_string(),
                issuer: None,
            },
        }
    }
}
