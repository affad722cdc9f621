//! Model endpoint configuration.
//!
//! The `model` section of `settings.yaml`. Every field except `api_key` has a
//! default; `api_key` is usually written as `${ANTHROPIC_API_KEY}`.

use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

/// Default Messages API root.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default completion budget per round trip.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Connection settings for the model endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_version")]
    pub anthropic_version: String,
    /// Client-side bound on one model request. Unset means no bound.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            anthropic_version: default_api_version(),
            request_timeout_secs: None,
        }
    }
}

impl ModelConfig {
    /// Reject settings that can never produce a successful request.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.api_key.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "model.api_key is empty (set ANTHROPIC_API_KEY)".into(),
            });
        }
        if self.max_tokens == 0 {
            return Err(InferenceError::ConfigError {
                reason: "model.max_tokens must be positive".into(),
            });
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| InferenceError::ConfigError {
            reason: format!("model.base_url '{}' is invalid: {e}", self.base_url),
        })?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// `{base_url}/messages`, tolerant of a trailing slash.
    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }
}
