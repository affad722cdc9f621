//! Messages API client.
//!
//! Sends one model round trip to `POST {base_url}/messages`, either waiting
//! for the complete reply or streaming it back as `ModelStreamEvent`s. Errors
//! are returned as-is; retry policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client as HttpClient;

use super::config::ModelConfig;
use super::errors::InferenceError;
use super::streaming::{parse_event_stream, parse_reply};
use super::types::{MessagesRequest, ModelReply, ModelRequest, ModelStreamEvent};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream of events for one streamed reply.
pub type ModelEventStream = BoxStream<'static, Result<ModelStreamEvent, InferenceError>>;

// ─── ModelClient ─────────────────────────────────────────────────────────────

/// One model round trip, complete or streamed.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn create_message(&self, request: &ModelRequest) -> Result<ModelReply, InferenceError>;

    async fn stream_message(&self, request: &ModelRequest)
        -> Result<ModelEventStream, InferenceError>;
}

// ─── AnthropicClient ─────────────────────────────────────────────────────────

/// `ModelClient` for the Anthropic Messages API.
pub struct AnthropicClient {
    http: HttpClient,
    config: ModelConfig,
}

impl AnthropicClient {
    /// Build the client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        config.validate()?;

        let mut builder = HttpClient::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| InferenceError::ConnectionFailed {
            endpoint: config.base_url.clone(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self { http, config })
    }

    async fn send(
        &self,
        request: &ModelRequest,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = self.config.messages_url();
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
            tools: &request.tools,
            stream,
        };

        // Metadata only, the full body can be huge.
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.len(),
            max_tokens = body.max_tokens,
            stream,
            "=== LLM REQUEST ==="
        );

        let mut builder = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .json(&body);
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body_text, "model endpoint error");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(response)
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                duration_secs: self.config.request_timeout_secs.unwrap_or_default(),
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn create_message(&self, request: &ModelRequest) -> Result<ModelReply, InferenceError> {
        let response = self.send(request, false).await?;
        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs.unwrap_or_default(),
                }
            } else {
                InferenceError::StreamError {
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        let reply = parse_reply(&body_text)?;
        tracing::debug!(
            stop_reason = reply.stop_reason.as_deref().unwrap_or("none"),
            blocks = reply.content.len(),
            "=== LLM RESPONSE ==="
        );
        Ok(reply)
    }

    async fn stream_message(
        &self,
        request: &ModelRequest,
    ) -> Result<ModelEventStream, InferenceError> {
        let response = self.send(request, true).await?;
        Ok(parse_event_stream(response.bytes_stream()).boxed())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::Message;

    fn config(base_url: &str) -> ModelConfig {
        ModelConfig {
            api_key: "sk-test".into(),
            base_url: base_url.into(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_missing_key() {
        let result = AnthropicClient::new(ModelConfig::default());
        assert!(matches!(result, Err(InferenceError::ConfigError { .. })));
    }

    #[test]
    fn test_new_accepts_valid_config() {
        let client = AnthropicClient::new(config("http://localhost:1/v1")).unwrap();
        assert_eq!(client.config.model, crate::inference::config::DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let client = AnthropicClient::new(config("http://127.0.0.1:9/v1")).unwrap();
        let request = ModelRequest {
            system: None,
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
        };
        let err = client.create_message(&request).await.unwrap_err();
        assert!(matches!(err, InferenceError::ConnectionFailed { .. }));
    }
}
