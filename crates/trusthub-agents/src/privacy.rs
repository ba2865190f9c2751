//! PHI masking for claims that leave the hub.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use trusthub_core::ClaimMap;

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3}-\d{2}-\d{4}").expect("valid regex"));

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid regex"));

pub const SSN_MASK: &str = "[SSN_MASKED]";
pub const PHONE_MASK: &str = "[PHONE_MASKED]";

/// Mask SSNs and phone numbers in every string value, at any depth.
///
/// Keys and non-string scalars are left untouched.
pub fn mask_phi(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(mask_phi).collect()),
        Value::Object(map) => Value::Object(mask_claims(map)),
        other => other.clone(),
    }
}

/// [`mask_phi`] for a claim map.
pub fn mask_claims(claims: &ClaimMap) -> ClaimMap {
    claims
        .iter()
        .map(|(k, v)| (k.clone(), mask_phi(v)))
        .collect()
}

fn mask_str(s: &str) -> String {
    let masked = SSN.replace_all(s, SSN_MASK);
    PHONE.replace_all(&masked, PHONE_MASK).into_owned()
}
