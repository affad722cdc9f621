//! Shared types for the agent core.
//!
//! Request/reply shapes for one conversation turn and the progress events
//! the streaming orchestrator hands to the relay.

use serde::{Deserialize, Serialize};

use crate::inference::Message;
use crate::mcp_client::ToolContent;

// ─── Request / Reply ────────────────────────────────────────────────────────

/// One user turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Prior messages, oldest first. The new user message is appended.
    #[serde(default)]
    pub history: Vec<Message>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Final answer of one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatReply {
    /// Concatenated text of the final model reply.
    pub response: String,
    /// Tool names in invocation order, repeats included.
    pub tools_used: Vec<String>,
}

// ─── Tool Outcome ───────────────────────────────────────────────────────────

/// What came back from one tool invocation, success or failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: ToolContent,
    pub is_error: bool,
}

// ─── Progress Events ────────────────────────────────────────────────────────

/// One unit of progress from the streaming orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A text fragment from the model.
    Text(String),
    /// A tool call is about to be made.
    ToolStart {
        name: String,
        input: serde_json::Value,
        /// Required arguments the model left out.
        missing_params: Vec<String>,
    },
    /// A tool call finished.
    ToolResult { name: String, outcome: ToolOutcome },
}
