//! Agent Core: the tool-use conversation layer.
//!
//! Submodules:
//! - `catalog`: Tool descriptors → model-facing schemas, required-arg checks
//! - `tool_dispatch`: Runs one tool use against the registry, errors as content
//! - `orchestrator`: The model ⇄ tools loop, complete or streamed
//! - `types`: Request/reply and progress event types
//! - `errors`: Agent-level error types

pub mod catalog;
pub mod errors;
pub mod orchestrator;
pub mod tool_dispatch;
pub mod types;

// Re-exports for convenience
pub use errors::AgentError;
pub use orchestrator::{compose_system_prompt, AgentConfig, Orchestrator, POLICY_PROMPT};
pub use types::{AgentEvent, ChatReply, ChatRequest, ToolOutcome};
