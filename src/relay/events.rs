//! Caller-facing relay events and their wire encoding.

use serde::Serialize;
use serde_json::{json, Value};

use crate::agent_core::AgentEvent;
use crate::sse::encode_frame;

/// Outcome label carried by `tool_result` and `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// One unit of the caller-facing event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Start,
    Text {
        text: String,
    },
    ToolStart {
        name: String,
        input: Value,
        missing_params: Vec<String>,
    },
    ToolResult {
        name: String,
        result: Value,
        status: Status,
    },
    Error {
        message: String,
    },
    Done {
        response: String,
        tools_used: Vec<String>,
        status: Status,
    },
}

impl RelayEvent {
    /// The `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::Start => "start",
            RelayEvent::Text { .. } => "text",
            RelayEvent::ToolStart { .. } => "tool_start",
            RelayEvent::ToolResult { .. } => "tool_result",
            RelayEvent::Error { .. } => "error",
            RelayEvent::Done { .. } => "done",
        }
    }

    /// The `data:` object.
    pub fn payload(&self) -> Value {
        match self {
            RelayEvent::Start => json!({ "status": "started" }),
            RelayEvent::Text { text } => json!({ "text": text }),
            RelayEvent::ToolStart {
                name,
                input,
                missing_params,
            } => json!({
                "name": name,
                "input": input,
                "status": "running",
                "missing_params": missing_params,
            }),
            RelayEvent::ToolResult {
                name,
                result,
                status,
            } => json!({ "name": name, "result": result, "status": status }),
            RelayEvent::Error { message } => json!({ "message": message }),
            RelayEvent::Done {
                response,
                tools_used,
                status,
            } => json!({
                "response": response,
                "tools_used": tools_used,
                "status": status,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done { .. })
    }

    /// `event: <kind>\ndata: <json>\n\n`
    pub fn to_frame(&self) -> String {
        encode_frame(self.kind(), &self.payload().to_string())
    }
}

impl From<AgentEvent> for RelayEvent {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::Text(text) => RelayEvent::Text { text },
            AgentEvent::ToolStart {
                name,
                input,
                missing_params,
            } => RelayEvent::ToolStart {
                name,
                input,
                missing_params,
            },
            AgentEvent::ToolResult { name, outcome } => RelayEvent::ToolResult {
                name,
                result: outcome.content.to_value(),
                status: if outcome.is_error {
                    Status::Error
                } else {
                    Status::Success
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::ToolOutcome;
    use crate::mcp_client::ToolContent;

    #[test]
    fn test_frames() {
        assert_eq!(
            RelayEvent::Start.to_frame(),
            "event: start\ndata: {\"status\":\"started\"}\n\n"
        );
        assert_eq!(
            RelayEvent::Text { text: "hi\n".into() }.to_frame(),
            "event: text\ndata: {\"text\":\"hi\\n\"}\n\n"
        );
    }

    #[test]
    fn test_tool_start_payload() {
        let event = RelayEvent::ToolStart {
            name: "add".into(),
            input: json!({"a": 1}),
            missing_params: vec!["b".into()],
        };
        assert_eq!(
            event.payload(),
            json!({"name": "add", "input": {"a": 1}, "status": "running", "missing_params": ["b"]})
        );
    }

    #[test]
    fn test_done_payload_and_terminal() {
        let event = RelayEvent::Done {
            response: "ok".into(),
            tools_used: vec!["echo".into()],
            status: Status::Success,
        };
        assert!(event.is_terminal());
        assert_eq!(
            event.payload(),
            json!({"response": "ok", "tools_used": ["echo"], "status": "success"})
        );
        assert!(!RelayEvent::Error { message: "x".into() }.is_terminal());
    }

    #[test]
    fn test_from_agent_tool_result() {
        let event: RelayEvent = AgentEvent::ToolResult {
            name: "echo".into(),
            outcome: ToolOutcome {
                content: ToolContent::Opaque("{\"error\":\"boom\"}".into()),
                is_error: true,
            },
        }
        .into();
        assert_eq!(
            event.payload(),
            json!({"name": "echo", "result": "{\"error\":\"boom\"}", "status": "error"})
        );
    }
}
