//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::mcp_client::McpError;

/// Errors that abort one conversation request.
///
/// Tool failures are not here: they are narrated to the model as error
/// content and never end the request.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model endpoint failed; not retried.
    #[error("model request failed: {0}")]
    Inference(#[from] InferenceError),

    /// The registry could not be used at all (not initialized, closed).
    #[error("tool registry unavailable: {0}")]
    Registry(#[from] McpError),

    /// The model kept requesting tools past the configured bound.
    #[error("tool round limit reached after {rounds} model round trips")]
    ToolRoundLimit { rounds: u32 },

    /// The event receiver was dropped mid-request.
    #[error("request cancelled: event receiver dropped")]
    Cancelled,
}
