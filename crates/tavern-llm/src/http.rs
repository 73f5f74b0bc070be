//! HTTP implementation of [`CompletionBackend`] for an OpenAI-compatible
//! Responses API.
//!
//! One POST to `{base_url}/v1/responses` per exchange. The conversation is
//! threaded server-side: the response `id` becomes the next request's
//! `previous_response_id`, so the relay never resends the transcript.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tavern_settings::CompletionSettings;
use tracing::{debug, warn};

use crate::backend::{
    CompletionBackend, CompletionError, CompletionOutcome, CompletionResult,
};

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    id: String,
    #[serde(default)]
    output_text: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Completion backend speaking the Responses API over HTTP.
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpCompletionBackend {
    /// Build a backend from settings and a credential.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &CompletionSettings, api_key: String) -> CompletionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(settings, api_key, client))
    }

    /// Build a backend with a caller-supplied client (used in tests).
    #[must_use]
    pub fn with_client(
        settings: &CompletionSettings,
        api_key: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            model: settings.model.clone(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/responses", self.base_url)
    }
}

/// Extract a human-readable message from an error response body.
///
/// Accepts the `{"error": {"message": ...}}` shape; falls back to the raw
/// body for anything else.
fn parse_api_error(body: &str, status: u16) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_owned();
        }
    }
    format!("HTTP {status}: {body}")
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(
        &self,
        text: &str,
        continuation: Option<&str>,
    ) -> CompletionResult<CompletionOutcome> {
        let request = ResponsesRequest {
            model: &self.model,
            input: text,
            previous_response_id: continuation,
        };

        debug!(
            model = %self.model,
            has_continuation = continuation.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(&body, status.as_u16());
            warn!(status = status.as_u16(), %message, "completion request failed");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let reply: ResponsesReply = serde_json::from_str(&body)?;
        if reply.output_text.is_empty() {
            return Err(CompletionError::EmptyReply);
        }

        Ok(CompletionOutcome {
            reply: reply.output_text,
            continuation: reply.id,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpCompletionBackend {
        let settings = CompletionSettings {
            base_url: server.uri(),
            model: "test-model".to_owned(),
            request_timeout_secs: 5,
        };
        HttpCompletionBackend::new(&settings, "test-key".to_owned()).unwrap()
    }

    #[tokio::test]
    async fn first_exchange_omits_previous_response_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "input": "hello",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_1",
                "output_text": "hi there",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server).complete("hello", None).await.unwrap();
        assert_eq!(outcome.reply, "hi there");
        assert_eq!(outcome.continuation, "resp_1");

        // previous_response_id must be absent entirely, not null
        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("previous_response_id").is_none());
    }

    #[tokio::test]
    async fn second_exchange_threads_continuation_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(body_partial_json(serde_json::json!({
                "input": "and then?",
                "previous_response_id": "resp_1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_2",
                "output_text": "more",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .complete("and then?", Some("resp_1"))
            .await
            .unwrap();
        assert_eq!(outcome.continuation, "resp_2");
    }

    #[tokio::test]
    async fn api_error_surfaces_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "bad key"},
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server).complete("x", None).await.unwrap_err();
        assert_matches!(
            err,
            CompletionError::Api { status: 401, ref message } if message == "bad key"
        );
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = backend_for(&server).complete("x", None).await.unwrap_err();
        assert_matches!(
            err,
            CompletionError::Api { status: 502, ref message } if message.contains("bad gateway")
        );
    }

    #[tokio::test]
    async fn empty_output_text_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_1",
                "output_text": "",
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server).complete("x", None).await.unwrap_err();
        assert_matches!(err, CompletionError::EmptyReply);
    }

    #[test]
    fn parse_api_error_extracts_nested_message() {
        let msg = parse_api_error(r#"{"error": {"message": "quota exceeded"}}"#, 429);
        assert_eq!(msg, "quota exceeded");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let settings = CompletionSettings {
            base_url: "https://api.example.com/".to_owned(),
            model: "m".to_owned(),
            request_timeout_secs: 5,
        };
        let backend = HttpCompletionBackend::with_client(
            &settings,
            "k".to_owned(),
            reqwest::Client::new(),
        );
        assert_eq!(backend.endpoint(), "https://api.example.com/v1/responses");
    }
}
