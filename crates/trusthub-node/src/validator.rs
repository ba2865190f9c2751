//! HTTP semantic validator.
//!
//! Posts `{claims, policyContext}` to an external reviewer and expects a
//! `{valid, reason}` reply. Anything else is an error; a judgment is never
//! invented on the caller's behalf.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use trusthub_agents::{Judgment, SemanticValidator, ValidatorError};
use trusthub_core::ClaimMap;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationRequest<'a> {
    claims: &'a ClaimMap,
    policy_context: &'a Value,
}

pub struct HttpSemanticValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSemanticValidator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SemanticValidator for HttpSemanticValidator {
    async fn evaluate(
        &self,
        claims: &ClaimMap,
        policy_context: &Value,
    ) -> Result<Judgment, ValidatorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ValidationRequest {
                claims,
                policy_context,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidatorError::Timeout
                } else {
                    ValidatorError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::Status(status.as_u16()));
        }

        let judgment = response
            .json::<Judgment>()
            .await
            .map_err(|e| ValidatorError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            endpoint = %self.endpoint,
            valid = judgment.valid,
            "semantic validator answered"
        );
        Ok(judgment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn claims() -> ClaimMap {
        json!({"hba1c": 7.1}).as_object().cloned().unwrap()
    }

    async fn validator_for(server: &MockServer) -> HttpSemanticValidator {
        HttpSemanticValidator::new(format!("{}/validate", server.uri()), Duration::from_secs(2))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .and(body_partial_json(json!({
                "claims": {"hba1c": 7.1},
                "policyContext": {"policy": "CMS-0057-F"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"valid": true, "reason": "aligned"})),
            )
            .mount(&server)
            .await;

        let judgment = validator_for(&server)
            .await
            .evaluate(&claims(), &json!({"policy": "CMS-0057-F"}))
            .await
            .unwrap();
        assert_eq!(judgment, Judgment::valid("aligned"));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = validator_for(&server)
            .await
            .evaluate(&claims(), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::Status(503)));
    }

    #[tokio::test]
    async fn test_unparseable_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Looks compliant to me!"))
            .mount(&server)
            .await;

        let err = validator_for(&server)
            .await
            .evaluate(&claims(), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"valid": true, "reason": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let endpoint = format!("{}/validate", server.uri());
        let validator = HttpSemanticValidator::new(endpoint, Duration::from_millis(50)).unwrap();
        let err = validator.evaluate(&claims(), &Value::Null).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Timeout));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let validator =
            HttpSemanticValidator::new("http://127.0.0.1:1/validate", Duration::from_secs(1))
                .unwrap();
        let err = validator.evaluate(&claims(), &Value::Null).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Unavailable(_) | ValidatorError::Timeout));
    }
}
