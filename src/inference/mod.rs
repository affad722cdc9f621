//! Inference Client: Anthropic Messages API client.
//!
//! This module handles all communication with the model endpoint:
//! - Streaming and non-streaming message requests
//! - SSE stream parsing and content-block assembly
//! - Model endpoint configuration (the `model` section of settings)
//!
//! The orchestrator only sees the [`ModelClient`] trait, so the endpoint is
//! interchangeable and tests can script replies.

pub mod client;
pub mod config;
pub mod errors;
pub mod streaming;
pub mod types;

#[cfg(test)]
pub mod testing;

// Re-exports for convenience
pub use client::{AnthropicClient, ModelClient, ModelEventStream};
pub use config::ModelConfig;
pub use errors::InferenceError;
pub use types::{
    ContentBlock, Message, MessageContent, ModelReply, ModelRequest, ModelStreamEvent, Role,
    ToolSchema, ToolUse,
};
