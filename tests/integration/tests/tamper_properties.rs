//! Property tests for the signing contract: honest credentials verify, and
//! any post-signing change is caught with the right rejection code.

use chrono::Duration;
use proptest::prelude::*;
use serde_json::{json, Value};

use trusthub_core::{canonical, CanonicalBytes, ClaimMap, Credential};
use trusthub_credentials::{CredentialIssuer, CredentialVerifier, Rejection};
use trusthub_crypto::KeyPair;
use trusthub_identity::{IssuerRecord, IssuerRole};
use trusthub_integration_tests::{parties, CMS_AUTHORITY, LAB};

const UNREGISTERED: &str = "did:web:unregistered.example";

fn claim_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
        prop::collection::vec(any::<u16>(), 0..4).prop_map(|v| json!(v)),
    ]
}

fn claim_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-zA-Z_]{1,10}", claim_value(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn to_claims(entries: &[(String, Value)]) -> ClaimMap {
    entries.iter().cloned().collect()
}

/// CMS and the lab, each with its own key and default verification method.
fn two_issuers() -> (CredentialVerifier, CredentialIssuer) {
    let cms = KeyPair::generate();
    let lab = KeyPair::generate();
    let (registry, mut issuers) = parties(vec![
        (
            IssuerRecord::new(CMS_AUTHORITY, cms.public_key(), IssuerRole::AttestationAuthority),
            cms,
        ),
        (
            IssuerRecord::new(LAB, lab.public_key(), IssuerRole::DiagnosticLab),
            lab,
        ),
    ]);
    (CredentialVerifier::new(registry), issuers.remove(0))
}

fn rejection(verifier: &CredentialVerifier, credential: &Credential) -> Rejection {
    verifier
        .verify(credential)
        .expect_err("tampered credential must be rejected")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn honest_credentials_verify(entries in claim_entries()) {
        let (verifier, issuer) = two_issuers();
        let vc = issuer.issue(vec!["TestCredential".into()], to_claims(&entries)).unwrap();

        let verified = verifier.verify(&vc).unwrap();
        prop_assert_eq!(verified.issuer, CMS_AUTHORITY);
        prop_assert_eq!(verified.credential_id, vc.id);
    }

    #[test]
    fn claim_changes_break_the_signature(entries in claim_entries(), extra in claim_value()) {
        let (verifier, issuer) = two_issuers();
        let vc = issuer.issue(vec![], to_claims(&entries)).unwrap();

        let mut added = vc.clone();
        added.credential_subject.insert("injected".into(), extra.clone());
        prop_assert!(matches!(rejection(&verifier, &added), Rejection::SignatureInvalid(_)));

        if let Some((key, value)) = entries.first() {
            let mut changed = vc.clone();
            changed.credential_subject.insert(key.clone(), json!([value]));
            prop_assert!(matches!(rejection(&verifier, &changed), Rejection::SignatureInvalid(_)));

            let mut removed = vc.clone();
            removed.credential_subject.remove(key);
            prop_assert!(matches!(rejection(&verifier, &removed), Rejection::SignatureInvalid(_)));
        }
    }

    #[test]
    fn id_and_date_changes_break_the_signature(entries in claim_entries(), secs in 1i64..100_000) {
        let (verifier, issuer) = two_issuers();
        let vc = issuer.issue(vec![], to_claims(&entries)).unwrap();

        let mut renamed = vc.clone();
        renamed.id = format!("{}-x", vc.id);
        prop_assert!(matches!(rejection(&verifier, &renamed), Rejection::SignatureInvalid(_)));

        let mut backdated = vc.clone();
        backdated.issuance_date = vc.issuance_date - Duration::seconds(secs);
        prop_assert!(matches!(rejection(&verifier, &backdated), Rejection::SignatureInvalid(_)));
    }

    #[test]
    fn canonical_bytes_ignore_insertion_order(
        (entries, shuffled) in claim_entries()
            .prop_flat_map(|e| (Just(e.clone()), Just(e).prop_shuffle()))
    ) {
        let a = CanonicalBytes::new(&to_claims(&entries)).unwrap();
        let b = CanonicalBytes::new(&to_claims(&shuffled)).unwrap();
        prop_assert_eq!(a, b);
    }
}

// ============================================================================
// Issuer changes
// ============================================================================

#[test]
fn test_issuer_moved_to_unregistered_id() {
    let (verifier, issuer) = two_issuers();
    let mut vc = issuer.issue(vec![], ClaimMap::new()).unwrap();
    vc.issuer = UNREGISTERED.into();

    assert_eq!(rejection(&verifier, &vc).code(), "UnknownIssuer");
}

#[test]
fn test_issuer_moved_to_other_registered_issuer() {
    let (verifier, issuer) = two_issuers();
    let mut vc = issuer.issue(vec![], ClaimMap::new()).unwrap();
    vc.issuer = LAB.into();

    // The proof still names the CMS key, which is not the lab's.
    assert_eq!(rejection(&verifier, &vc).code(), "VerificationMethodMismatch");
}

#[test]
fn test_issuer_moved_between_ids_sharing_a_verification_method() {
    let shared_vm = "did:web:cms.gov#shared-key";
    let cms = KeyPair::generate();
    let alias = KeyPair::generate();
    let (registry, mut issuers) = parties(vec![
        (
            IssuerRecord::new(CMS_AUTHORITY, cms.public_key(), IssuerRole::AttestationAuthority)
                .with_verification_method(shared_vm),
            cms,
        ),
        (
            IssuerRecord::new(LAB, alias.public_key(), IssuerRole::DiagnosticLab)
                .with_verification_method(shared_vm),
            alias,
        ),
    ]);
    let verifier = CredentialVerifier::new(registry);
    let issuer = issuers.remove(0);

    let mut vc = issuer.issue(vec![], ClaimMap::new()).unwrap();
    assert!(verifier.verify(&vc).is_ok());
    vc.issuer = LAB.into();

    // Method check passes, so only the signature can catch the change.
    assert!(matches!(rejection(&verifier, &vc), Rejection::SignatureInvalid(_)));
}

#[test]
fn test_foreign_key_with_other_verification_method() {
    let (verifier, _) = two_issuers();

    // Same issuer id, different key, registered elsewhere under #key-2.
    let rogue_key = KeyPair::generate();
    let (_, mut rogue) = parties(vec![(
        IssuerRecord::new(CMS_AUTHORITY, rogue_key.public_key(), IssuerRole::AttestationAuthority)
            .with_verification_method(format!("{CMS_AUTHORITY}#key-2")),
        rogue_key,
    )]);
    let vc = rogue.remove(0).issue(vec![], ClaimMap::new()).unwrap();

    match rejection(&verifier, &vc) {
        Rejection::VerificationMethodMismatch { expected, found } => {
            assert_eq!(expected, format!("{CMS_AUTHORITY}#key-1"));
            assert_eq!(found, format!("{CMS_AUTHORITY}#key-2"));
        }
        other => panic!("unexpected rejection: {other:?}"),
    }
}

#[test]
fn test_foreign_key_claiming_registered_verification_method() {
    let (verifier, _) = two_issuers();

    let rogue_key = KeyPair::generate();
    let (_, mut rogue) = parties(vec![(
        IssuerRecord::new(CMS_AUTHORITY, rogue_key.public_key(), IssuerRole::AttestationAuthority),
        rogue_key,
    )]);
    let vc = rogue.remove(0).issue(vec![], ClaimMap::new()).unwrap();

    assert!(matches!(rejection(&verifier, &vc), Rejection::SignatureInvalid(_)));
}

#[test]
fn test_signed_credential_cannot_be_reencoded() {
    let (_, issuer) = two_issuers();
    let vc = issuer.issue(vec![], ClaimMap::new()).unwrap();

    assert!(canonical::encode(&vc).is_err());
    assert!(canonical::encode(&vc.without_proof()).is_ok());
}

#[test]
fn test_reformatted_issuance_date_is_malformed() {
    let (verifier, issuer) = two_issuers();
    let vc = issuer.issue(vec![], ClaimMap::new()).unwrap();
    let signed = serde_json::to_value(&vc).unwrap();
    let text = signed["issuanceDate"].as_str().unwrap().to_string();
    assert!(verifier.verify_json(&signed).is_ok());

    // Same second, different text.
    let same_second = text.replace('Z', ".999Z");
    let numeric_offset = text.replace('Z', "+00:00");
    for edited in [same_second, numeric_offset] {
        let mut tampered = signed.clone();
        tampered["issuanceDate"] = json!(edited);
        let rejection = verifier.verify_json(&tampered).unwrap_err();
        assert!(
            matches!(rejection, Rejection::MalformedProofEncoding(_)),
            "{edited}: {rejection:?}"
        );
    }
}
