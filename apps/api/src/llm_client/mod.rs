/// LLM Client — the single point of entry for generative-model calls.
///
/// ARCHITECTURAL RULE: No other module may call the model endpoint directly.
/// The pipeline talks to `dyn ModelGateway`; `GeminiClient` is the production backend.
///
/// One request per call: no retries, no streaming, no caching.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Network failures and non-2xx statuses, as opposed to a bad response body.
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Http(_) | GatewayError::Api { .. })
    }
}

/// Issues one prompt-completion request and returns the raw completion text.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Gemini `generateContent` backend.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let request_body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Try to parse error message
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedResponse(format!("body is not JSON: {e}")))?;

        let text = parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedResponse(
                    "no text at candidates[0].content.parts[0].text".to_string(),
                )
            })?;

        debug!(
            "Model call succeeded: prompt_bytes={}, completion_bytes={}",
            prompt.len(),
            text.len()
        );

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            format!("{}/v1beta/models/gemini-pro:generateContent", server.uri()),
            "test-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_response_text_path() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"keySkills\": []}"}]}}]
        }))
        .unwrap();
        assert_eq!(response.text(), Some("{\"keySkills\": []}"));
    }

    #[test]
    fn test_response_text_missing_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(response.text(), None);
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-pro:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({"contents": [{"parts": [{"text": "Analyze this"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "```json\n{}\n```"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).complete("Analyze this").await.unwrap();
        assert_eq!(text, "```json\n{}\n```");
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key not valid"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert!(err.is_transport());
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_missing_text_path_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = GeminiClient::new(
            "http://127.0.0.1:1/generate".to_string(),
            "k".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::Http(_)));
    }
}
