//! Text generation backends used for question generation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by language model clients.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build LLM client: {0}")]
    Client(String),
    /// The provider could not be reached.
    #[error("LLM provider unreachable: {0}")]
    Transport(String),
    /// The provider answered with a non-success status.
    #[error("LLM provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The provider response could not be decoded or carried no text.
    #[error("Malformed LLM response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by language model providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `prompt`, expected to contain a JSON array.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client for `base_url` and `model`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent(concat!("indusnlp/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Client(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.5,
                "topP": 0.95,
                "topK": 40,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse(
                "response carried no candidate text".into(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            server.base_url(),
            "gemini-key",
            "gemini-2.5-flash",
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn concatenates_candidate_parts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash:generateContent")
                    .header("x-goog-api-key", "gemini-key")
                    .body_contains("\"responseMimeType\":\"application/json\"");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "[{\"question\":" }, { "text": "\"Q\"}]" }] }
                    }]
                }));
            })
            .await;

        let text = client(&server).generate("prompt").await.expect("text");

        mock.assert_async().await;
        assert_eq!(text, "[{\"question\":\"Q\"}]");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("quota");
            })
            .await;

        let error = client(&server).generate("prompt").await.expect_err("error");
        assert!(matches!(
            error,
            LlmError::UnexpectedStatus { status: 429, ref body } if body == "quota"
        ));
    }

    #[tokio::test]
    async fn missing_candidates_are_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .json_body(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
            })
            .await;

        let error = client(&server).generate("prompt").await.expect_err("error");
        assert!(matches!(error, LlmError::InvalidResponse(_)));
    }
}
