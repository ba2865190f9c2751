use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_core::ClaimMap;

use crate::collaborators::StructuralValidator;

/// Expected JSON type of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    Date,
}

impl ClaimType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        }
    }
}

/// Definition of a claim within a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDefinition {
    pub name: String,
    pub value_type: ClaimType,
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl ClaimDefinition {
    fn new(name: &str, value_type: ClaimType, required: bool, description: &str) -> Self {
        Self {
            name: name.into(),
            value_type,
            required,
            description: Some(description.into()),
        }
    }
}

/// Shape of a claim bundle submitted for attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSchema {
    pub id: String,
    pub name: String,
    pub version: String,
    pub claims: Vec<ClaimDefinition>,
}

impl ClaimSchema {
    /// Healthcare data attestation: provider identity plus a FHIR bundle.
    pub fn healthcare_attestation_v1() -> Self {
        Self {
            id: "healthcare-attestation-v1".into(),
            name: "Healthcare Data Attestation".into(),
            version: "1.0.0".into(),
            claims: vec![
                ClaimDefinition::new(
                    "provider_id",
                    ClaimType::String,
                    true,
                    "Submitting provider identifier",
                ),
                ClaimDefinition::new(
                    "fhir_bundle",
                    ClaimType::Object,
                    true,
                    "FHIR R4 bundle with the clinical evidence",
                ),
                ClaimDefinition::new(
                    "attestation_type",
                    ClaimType::String,
                    false,
                    "Kind of attestation requested",
                ),
                ClaimDefinition::new(
                    "service_date",
                    ClaimType::Date,
                    false,
                    "Date the documented service was rendered",
                ),
            ],
        }
    }

    /// Prior-authorization evidence bundle.
    pub fn prior_auth_evidence_v1() -> Self {
        Self {
            id: "prior-auth-evidence-v1".into(),
            name: "Prior Authorization Evidence".into(),
            version: "1.0.0".into(),
            claims: vec![
                ClaimDefinition::new("patient_id", ClaimType::String, true, "Payer member id"),
                ClaimDefinition::new(
                    "procedure_code",
                    ClaimType::String,
                    true,
                    "CPT/HCPCS code of the requested service",
                ),
                ClaimDefinition::new(
                    "diagnosis_codes",
                    ClaimType::Array,
                    true,
                    "ICD-10 codes supporting medical necessity",
                ),
            ],
        }
    }

    /// Look up a built-in schema by id.
    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "healthcare-attestation-v1" => Some(Self::healthcare_attestation_v1()),
            "prior-auth-evidence-v1" => Some(Self::prior_auth_evidence_v1()),
            _ => None,
        }
    }
}

/// Structural validator backed by a [`ClaimSchema`].
///
/// Claims not named by the schema are allowed.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: ClaimSchema,
}

impl SchemaValidator {
    pub fn new(schema: ClaimSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ClaimSchema {
        &self.schema
    }
}

impl StructuralValidator for SchemaValidator {
    fn check(&self, claims: &ClaimMap) -> Result<(), String> {
        for def in &self.schema.claims {
            match claims.get(&def.name) {
                None | Some(Value::Null) if def.required => {
                    return Err(format!("missing required claim: {}", def.name));
                }
                Some(value) if !value.is_null() && !def.value_type.matches(value) => {
                    return Err(format!(
                        "claim {} must be of type {:?}",
                        def.name, def.value_type
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Requires `fhir_bundle` to be a FHIR `Bundle` with at least one entry
/// whose resource is one of the accepted types.
#[derive(Debug, Clone)]
pub struct FhirResourceValidator {
    accepted: Vec<&'static str>,
}

impl FhirResourceValidator {
    pub fn new(accepted: Vec<&'static str>) -> Self {
        Self { accepted }
    }

    /// Lab results: an `Observation` or a `DiagnosticReport`.
    pub fn diagnostic() -> Self {
        Self::new(vec!["Observation", "DiagnosticReport"])
    }

    /// Pharmacy benefit requests: a `MedicationRequest`.
    pub fn medication() -> Self {
        Self::new(vec!["MedicationRequest"])
    }

    fn requirement(&self) -> String {
        let listed = self.accepted.join(" or ");
        let article = if listed.starts_with(['A', 'E', 'I', 'O', 'U']) {
            "an"
        } else {
            "a"
        };
        format!("Bundle must contain {article} {listed} resource")
    }
}

impl StructuralValidator for FhirResourceValidator {
    fn check(&self, claims: &ClaimMap) -> Result<(), String> {
        let bundle = claims
            .get("fhir_bundle")
            .filter(|b| b.get("resourceType").and_then(Value::as_str) == Some("Bundle"))
            .ok_or_else(|| "Invalid or missing FHIR Bundle".to_string())?;

        let found = bundle
            .get("entry")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.pointer("/resource/resourceType")?.as_str())
            .any(|kind| self.accepted.contains(&kind));
        if found {
            Ok(())
        } else {
            Err(self.requirement())
        }
    }
}

/// Look up a built-in structural check by id: a claim schema or a FHIR
/// resource requirement.
pub fn structural_validator(id: &str) -> Option<Arc<dyn StructuralValidator>> {
    match id {
        "lab-diagnostic-v1" => Some(Arc::new(FhirResourceValidator::diagnostic())),
        "pbm-medication-v1" => Some(Arc::new(FhirResourceValidator::medication())),
        other => ClaimSchema::builtin(other)
            .map(|schema| Arc::new(SchemaValidator::new(schema)) as Arc<dyn StructuralValidator>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(ClaimSchema::builtin("healthcare-attestation-v1").is_some());
        assert!(ClaimSchema::builtin("prior-auth-evidence-v1").is_some());
        assert!(ClaimSchema::builtin("kyc-basic-v1").is_none());
    }

    #[test]
    fn test_valid_bundle() {
        let validator = SchemaValidator::new(ClaimSchema::healthcare_attestation_v1());
        let bundle = claims(json!({
            "provider_id": "PROV-1",
            "fhir_bundle": {"resourceType": "Bundle", "entry": []},
            "service_date": "2024-03-01",
            "extra": 1
        }));
        assert!(validator.check(&bundle).is_ok());
    }

    #[test]
    fn test_missing_required_claim() {
        let validator = SchemaValidator::new(ClaimSchema::healthcare_attestation_v1());
        let err = validator
            .check(&claims(json!({"provider_id": "PROV-1"})))
            .unwrap_err();
        assert_eq!(err, "missing required claim: fhir_bundle");

        let err = validator
            .check(&claims(json!({"provider_id": null, "fhir_bundle": {}})))
            .unwrap_err();
        assert_eq!(err, "missing required claim: provider_id");
    }

    #[test]
    fn test_wrong_type() {
        let validator = SchemaValidator::new(ClaimSchema::healthcare_attestation_v1());
        let err = validator
            .check(&claims(json!({"provider_id": 42, "fhir_bundle": {}})))
            .unwrap_err();
        assert!(err.contains("provider_id"));
    }

    #[test]
    fn test_date_claims() {
        let validator = SchemaValidator::new(ClaimSchema::healthcare_attestation_v1());
        let base = json!({"provider_id": "P", "fhir_bundle": {}, "service_date": "03/01/2024"});
        assert!(validator.check(&claims(base)).is_err());
        assert!(ClaimType::Date.matches(&json!("2024-02-29")));
        assert!(!ClaimType::Date.matches(&json!("2023-02-29")));
    }

    #[test]
    fn test_optional_claim_may_be_absent() {
        let validator = SchemaValidator::new(ClaimSchema::prior_auth_evidence_v1());
        let bundle = claims(json!({
            "patient_id": "PAT-9",
            "procedure_code": "97110",
            "diagnosis_codes": ["M54.5"]
        }));
        assert!(validator.check(&bundle).is_ok());
        assert_eq!(validator.schema().id, "prior-auth-evidence-v1");
    }

    fn bundle_of(kinds: &[&str]) -> ClaimMap {
        let entries: Vec<Value> = kinds
            .iter()
            .map(|k| json!({"resource": {"resourceType": k}}))
            .collect();
        claims(json!({"fhir_bundle": {"resourceType": "Bundle", "entry": entries}}))
    }

    #[test]
    fn test_diagnostic_bundle() {
        let lab = FhirResourceValidator::diagnostic();
        assert!(lab.check(&bundle_of(&["Patient", "Observation"])).is_ok());
        assert!(lab.check(&bundle_of(&["DiagnosticReport"])).is_ok());
        assert_eq!(
            lab.check(&bundle_of(&["Patient"])).unwrap_err(),
            "Bundle must contain an Observation or DiagnosticReport resource"
        );
    }

    #[test]
    fn test_medication_bundle() {
        let pbm = FhirResourceValidator::medication();
        assert!(pbm.check(&bundle_of(&["MedicationRequest"])).is_ok());
        assert_eq!(
            pbm.check(&bundle_of(&["Observation"])).unwrap_err(),
            "Bundle must contain a MedicationRequest resource"
        );
    }

    #[test]
    fn test_missing_or_foreign_bundle() {
        let lab = FhirResourceValidator::diagnostic();
        for bad in [
            json!({}),
            json!({"fhir_bundle": "Bundle"}),
            json!({"fhir_bundle": {"resourceType": "Observation"}}),
        ] {
            assert_eq!(
                lab.check(&claims(bad)).unwrap_err(),
                "Invalid or missing FHIR Bundle"
            );
        }
        // A bundle without entries has no qualifying resource.
        let empty = claims(json!({"fhir_bundle": {"resourceType": "Bundle"}}));
        assert!(lab.check(&empty).unwrap_err().starts_with("Bundle must contain"));
    }

    #[test]
    fn test_structural_validator_lookup() {
        for id in [
            "healthcare-attestation-v1",
            "prior-auth-evidence-v1",
            "lab-diagnostic-v1",
            "pbm-medication-v1",
        ] {
            assert!(structural_validator(id).is_some(), "{id}");
        }
        assert!(structural_validator("kyc-basic-v1").is_none());
        let pbm = structural_validator("pbm-medication-v1").unwrap();
        assert!(pbm.check(&bundle_of(&["MedicationRequest"])).is_ok());
    }
}
