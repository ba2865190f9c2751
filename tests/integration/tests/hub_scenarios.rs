//! End-to-end scenarios through the dispatcher: attest, verify and decide
//! with real signatures and an in-memory ledger.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};

use trusthub_agents::dispatch::{METHOD_ATTEST, METHOD_DECIDE, METHOD_VERIFY};
use trusthub_agents::{
    AttestRequest, ComplianceStatus, DecideRequest, DecisionOutcome, ErrorCode, Request,
    Response, StaticValidator,
};
use trusthub_core::{Credential, ED25519_SIGNATURE_2020};
use trusthub_integration_tests::{claims, Hub, CMS_AUTHORITY, LAB};

fn compliant_hub() -> Hub {
    Hub::new(Arc::new(StaticValidator::approving("Data aligns with policy")))
}

async fn attest(hub: &Hub, tenant: &str) -> Credential {
    let result = hub
        .dispatcher
        .attest(AttestRequest {
            tenant_id: tenant.into(),
            claims: claims(json!({"status": "Compliant"})),
            policy_context: json!({"policy": "CMS-0057-F"}),
            request_id: None,
        })
        .await
        .expect("attest");
    result.credential
}

fn flip_signature_bit(credential: &Credential) -> Value {
    let mut tampered = credential.clone();
    let proof = tampered.proof.as_mut().expect("signed");
    let mut raw = URL_SAFE_NO_PAD
        .decode(&proof.signature_value)
        .expect("base64url signature");
    raw[0] ^= 0x01;
    proof.signature_value = URL_SAFE_NO_PAD.encode(raw);
    serde_json::to_value(tampered).expect("serialize")
}

// ============================================================================
// Attestation
// ============================================================================

#[tokio::test]
async fn test_attest_issues_signed_compliant_credential() {
    let hub = compliant_hub();
    let request = Request::from_parts(
        METHOD_ATTEST,
        json!({
            "tenantId": "PROV-1",
            "claims": {"status": "Compliant"},
            "policyContext": {}
        }),
    )
    .expect("request");

    let Response::Attestation(result) = hub.dispatcher.dispatch(request).await.expect("dispatch")
    else {
        panic!("expected an attestation response");
    };

    let id = result.attestation_id.strip_prefix("urn:uuid:").expect("URN id");
    assert_eq!(id.len(), 36);
    assert_eq!(id.matches('-').count(), 4);
    assert_eq!(result.status, ComplianceStatus::Compliant);

    let proof = result.credential.proof.as_ref().expect("proof");
    assert_eq!(proof.proof_type, ED25519_SIGNATURE_2020);
    assert_eq!(result.credential.issuer, CMS_AUTHORITY);
    assert_eq!(result.credential.id, result.attestation_id);
    assert_eq!(
        result.credential.claim("id"),
        Some(&json!("did:web:provider-PROV-1.com"))
    );

    let records = hub.ledger.records_for("PROV-1");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, result.attestation_id);
    assert_eq!(records[0].outcome, "Compliant");
}

#[tokio::test]
async fn test_attest_flagged_by_validator() {
    let hub = Hub::new(Arc::new(StaticValidator::flagging("HbA1c outside range")));
    let result = hub
        .dispatcher
        .attest(AttestRequest {
            tenant_id: "PROV-2".into(),
            claims: claims(json!({"hba1c": 11.2})),
            policy_context: Value::Null,
            request_id: None,
        })
        .await
        .expect("attest");

    assert_eq!(result.status, ComplianceStatus::Flagged);
    assert_eq!(
        result.credential.claim("validationReason"),
        Some(&json!("HbA1c outside range"))
    );
    // Flagged attestations are still signed and verifiable.
    assert!(hub.dispatcher.verify(&serde_json::to_value(&result.credential).unwrap()).ok);
}

#[tokio::test]
async fn test_attest_without_validator_issues_nothing() {
    let hub = Hub::new(Arc::new(StaticValidator::unavailable("connection refused")));
    let err = hub
        .dispatcher
        .attest(AttestRequest {
            tenant_id: "PROV-1".into(),
            claims: claims(json!({"status": "Compliant"})),
            policy_context: Value::Null,
            request_id: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::UpstreamUnavailable);
    assert!(hub.ledger.is_empty());
}

#[tokio::test]
async fn test_attest_retry_replays_first_result() {
    let hub = compliant_hub();
    let request = AttestRequest {
        tenant_id: "PROV-1".into(),
        claims: claims(json!({"status": "Compliant"})),
        policy_context: Value::Null,
        request_id: Some("txn-42".into()),
    };

    let first = hub.dispatcher.attest(request.clone()).await.expect("first");
    let second = hub.dispatcher.attest(request).await.expect("retry");

    assert_eq!(first, second);
    assert_eq!(hub.ledger.len(), 1);
}

#[tokio::test]
async fn test_attest_retry_with_other_claims_conflicts() {
    let hub = compliant_hub();
    let request = |value: Value| AttestRequest {
        tenant_id: "PROV-1".into(),
        claims: claims(value),
        policy_context: Value::Null,
        request_id: Some("r".into()),
    };

    hub.dispatcher
        .attest(request(json!({"hba1c": 7})))
        .await
        .expect("first");
    let err = hub
        .dispatcher
        .attest(request(json!({"hba1c": 12, "diagnosis": "other"})))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::RequestConflict);
    assert_eq!(hub.ledger.len(), 1);
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn test_verify_with_registered_issuer() {
    let hub = compliant_hub();
    let credential = attest(&hub, "PROV-1").await;

    let outcome = hub.dispatcher.verify(&serde_json::to_value(&credential).unwrap());
    assert!(outcome.ok);
    assert_eq!(outcome.reason, "Verified");
    assert_eq!(outcome.issuer.as_deref(), Some(CMS_AUTHORITY));
}

#[tokio::test]
async fn test_verify_with_registry_lacking_issuer() {
    let hub = compliant_hub();
    let credential = attest(&hub, "PROV-1").await;

    // A hub that only trusts the lab has never heard of the CMS authority.
    let lab_hub = Hub::with_issuer(LAB, Arc::new(StaticValidator::approving("ok")));
    assert!(!lab_hub.registry.contains(CMS_AUTHORITY));

    let request = Request::from_parts(
        METHOD_VERIFY,
        json!({"credential": serde_json::to_value(&credential).unwrap()}),
    )
    .expect("request");
    let response = lab_hub.dispatcher.dispatch(request).await.expect("dispatch");
    let Response::Verification(outcome) = response else {
        panic!("expected a verification response");
    };

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({"ok": false, "reason": "UnknownIssuer"})
    );
}

#[tokio::test]
async fn test_verify_garbage_document() {
    let hub = compliant_hub();
    let outcome = hub.dispatcher.verify(&json!({"hello": "world"}));
    assert!(!outcome.ok);
    assert_eq!(outcome.reason, "MalformedProofEncoding");
}

// ============================================================================
// Authorization decisions
// ============================================================================

#[tokio::test]
async fn test_decide_without_credential() {
    let hub = compliant_hub();
    let request = Request::from_parts(
        METHOD_DECIDE,
        json!({
            "tenantId": "PROV-1",
            "credential": null,
            "context": {"procedure": "MRI"}
        }),
    )
    .expect("request");

    let Response::Decision(decision) = hub.dispatcher.dispatch(request).await.expect("dispatch")
    else {
        panic!("expected a decision response");
    };

    assert_eq!(decision.outcome, DecisionOutcome::Denied);
    assert_eq!(decision.reason, "Missing Verifiable Credential");
    assert_eq!(decision.code, Some(ErrorCode::MissingCredential));
}

#[tokio::test]
async fn test_decide_with_flipped_signature_bit() {
    let hub = compliant_hub();
    let credential = attest(&hub, "PROV-1").await;

    let decision = hub
        .dispatcher
        .decide(DecideRequest {
            tenant_id: "PROV-1".into(),
            credential: Some(flip_signature_bit(&credential)),
            context: json!({"procedure": "MRI"}),
            request_id: None,
        })
        .await
        .expect("decide");

    assert_eq!(decision.outcome, DecisionOutcome::Denied);
    assert!(decision.reason.contains("SignatureInvalid"));
    assert_eq!(decision.credential_ref.as_deref(), Some(credential.id.as_str()));
    assert!(decision.valid_until.is_none());
}

#[tokio::test]
async fn test_decide_approves_verified_attestation() {
    let hub = compliant_hub();
    let credential = attest(&hub, "PROV-1").await;

    let decision = hub
        .dispatcher
        .decide(DecideRequest {
            tenant_id: "PROV-1".into(),
            credential: Some(serde_json::to_value(&credential).unwrap()),
            context: json!({"procedure": "MRI"}),
            request_id: None,
        })
        .await
        .expect("decide");

    assert!(decision.is_approved());
    assert_eq!(decision.credential_ref.as_deref(), Some(credential.id.as_str()));
    let (from, until) = (decision.valid_from.unwrap(), decision.valid_until.unwrap());
    assert_eq!((until - from).num_days(), 365);

    // One attestation record and one decision record for the tenant.
    assert_eq!(hub.ledger.records_for("PROV-1").len(), 2);
}

#[tokio::test]
async fn test_decide_rejects_credential_from_other_hub() {
    let hub = compliant_hub();
    let lab_hub = Hub::with_issuer(LAB, Arc::new(StaticValidator::approving("ok")));
    let foreign = attest(&lab_hub, "PROV-9").await;

    let decision = hub
        .dispatcher
        .decide(DecideRequest {
            tenant_id: "PROV-9".into(),
            credential: Some(serde_json::to_value(&foreign).unwrap()),
            context: Value::Null,
            request_id: None,
        })
        .await
        .expect("decide");

    assert_eq!(decision.outcome, DecisionOutcome::Denied);
    assert_eq!(decision.code, Some(ErrorCode::UnknownIssuer));
}

#[tokio::test]
async fn test_decide_retry_without_credential_conflicts() {
    let hub = compliant_hub();
    let credential = attest(&hub, "PROV-1").await;
    let request = |credential: Option<Value>| DecideRequest {
        tenant_id: "PROV-1".into(),
        credential,
        context: json!({"procedure": "MRI"}),
        request_id: Some("pa-1".into()),
    };

    let approved = hub
        .dispatcher
        .decide(request(Some(serde_json::to_value(&credential).unwrap())))
        .await
        .expect("decide");
    assert!(approved.is_approved());

    let err = hub.dispatcher.decide(request(None)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RequestConflict);
}
