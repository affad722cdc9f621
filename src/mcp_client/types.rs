//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 message types and MCP protocol structures.

use serde::{Deserialize, Serialize};

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an id).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// Protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP `initialize` response payload. Only the parts we log are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// One page of a `tools/list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsPage {
    #[serde(default)]
    pub tools: Vec<WireTool>,
    #[serde(default, alias = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// A tool as it appears on the wire.
///
/// Servers describe arguments either through a JSON `inputSchema` or, less
/// commonly, through an explicit `arguments` list.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub arguments: Option<Vec<WireArgument>>,
}

/// Explicit argument declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct WireArgument {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_hint: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `tools/call` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, alias = "isError")]
    pub is_error: bool,
}

// ─── Tool Descriptors ────────────────────────────────────────────────────────

/// Discovered metadata for one callable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Ordered argument list.
    pub arguments: Vec<ToolArgument>,
}

/// One declared tool argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolArgument {
    pub name: String,
    /// Free-form type hint (`"integer"`, `"list[str]"`, `"float"`, …).
    pub semantic_type: String,
    /// `Some(false)` marks the argument optional; anything else is required.
    pub required: Option<bool>,
    pub description: String,
}

impl ToolArgument {
    /// An argument is required unless it has been explicitly marked optional.
    pub fn is_required(&self) -> bool {
        self.required != Some(false)
    }
}

impl From<WireTool> for ToolDescriptor {
    fn from(tool: WireTool) -> Self {
        let arguments = match (tool.arguments, tool.input_schema) {
            (Some(explicit), _) => explicit
                .into_iter()
                .map(|arg| ToolArgument {
                    name: arg.name,
                    semantic_type: arg.type_hint.unwrap_or_else(|| "string".to_string()),
                    required: arg.required,
                    description: arg.description.unwrap_or_default(),
                })
                .collect(),
            (None, Some(schema)) => arguments_from_schema(&schema),
            (None, None) => Vec::new(),
        };

        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            arguments,
        }
    }
}

/// Derive arguments from a JSON-Schema object.
///
/// When the schema carries a `required` array, properties missing from it are
/// explicitly optional. Without one, nothing is marked optional.
fn arguments_from_schema(schema: &serde_json::Value) -> Vec<ToolArgument> {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };

    let required: Option<Vec<&str>> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect());

    properties
        .iter()
        .map(|(name, prop)| {
            let semantic_type = match prop.get("type") {
                Some(serde_json::Value::String(t)) => t.clone(),
                // Union types such as ["string", "null"]: first non-null wins.
                Some(serde_json::Value::Array(types)) => types
                    .iter()
                    .filter_map(|t| t.as_str())
                    .find(|t| *t != "null")
                    .unwrap_or("string")
                    .to_string(),
                _ => "string".to_string(),
            };
            ToolArgument {
                name: name.clone(),
                semantic_type,
                required: required.as_ref().map(|req| req.contains(&name.as_str())),
                description: prop
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect()
}

// ─── Tool Content ────────────────────────────────────────────────────────────

/// Normalized result of a tool call.
///
/// A result that is already a list of typed content items (each an object with
/// a `type` field) stays structured; anything else is serialized to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Structured(Vec<serde_json::Value>),
    Opaque(String),
}

impl ToolContent {
    /// Normalize a raw result with a single structural check.
    pub fn from_raw(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Array(items)
                if items
                    .iter()
                    .all(|item| item.as_object().is_some_and(|o| o.contains_key("type"))) =>
            {
                ToolContent::Structured(items)
            }
            other => ToolContent::Opaque(other.to_string()),
        }
    }

    /// Error content fed back to the model in place of a result.
    pub fn error(message: impl Into<String>) -> Self {
        ToolContent::from_raw(serde_json::json!({ "error": message.into() }))
    }

    /// The content as a JSON value, for event payloads.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ToolContent::Structured(items) => serde_json::Value::Array(items.clone()),
            ToolContent::Opaque(text) => serde_json::Value::String(text.clone()),
        }
    }
}

/// Result of a registry-level tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutput {
    /// Name of the session that served the call.
    pub server: String,
    pub content: ToolContent,
    /// The server flagged the result as an error (`isError`).
    pub is_error: bool,
}

// ─── Server State ────────────────────────────────────────────────────────────

/// Boot state of one configured server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServerState {
    Connecting,
    Handshaking,
    Warming { attempt: u32 },
    Ready { tool_count: usize },
    Failed { reason: String },
}

impl ServerState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ServerState::Ready { .. })
    }
}

// ─── Standard MCP Error Codes ────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_request_serialization() {
        let req = JsonRpcRequest::new(1, "initialize", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
        // params should be omitted when None
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/initialized", None);
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_json_rpc_error_response() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 2,
            "result": null,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_descriptor_from_input_schema() {
        let wire: WireTool = serde_json::from_value(serde_json::json!({
            "name": "search",
            "description": "Search things",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to find"},
                    "limit": {"type": "integer"},
                    "tags": {"type": ["array", "null"]}
                },
                "required": ["query"]
            }
        }))
        .unwrap();

        let desc = ToolDescriptor::from(wire);
        assert_eq!(desc.name, "search");
        let names: Vec<&str> = desc.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["query", "limit", "tags"]);
        assert!(desc.arguments[0].is_required());
        assert_eq!(desc.arguments[0].description, "What to find");
        assert!(!desc.arguments[1].is_required());
        assert_eq!(desc.arguments[1].semantic_type, "integer");
        assert_eq!(desc.arguments[2].semantic_type, "array");
    }

    #[test]
    fn test_descriptor_without_required_array_treats_all_as_required() {
        let wire: WireTool = serde_json::from_value(serde_json::json!({
            "name": "echo",
            "inputSchema": {"type": "object", "properties": {"text": {"type": "string"}}}
        }))
        .unwrap();
        let desc = ToolDescriptor::from(wire);
        assert_eq!(desc.description, "");
        assert!(desc.arguments[0].is_required());
    }

    #[test]
    fn test_descriptor_from_explicit_arguments() {
        let wire: WireTool = serde_json::from_value(serde_json::json!({
            "name": "add",
            "arguments": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": "float", "required": false}
            ]
        }))
        .unwrap();
        let desc = ToolDescriptor::from(wire);
        assert_eq!(desc.arguments[0].semantic_type, "int");
        assert!(desc.arguments[0].is_required());
        assert!(!desc.arguments[1].is_required());
    }

    #[test]
    fn test_tool_content_structured_when_all_typed() {
        let raw = serde_json::json!([{"type": "text", "text": "hi"}]);
        assert_eq!(
            ToolContent::from_raw(raw),
            ToolContent::Structured(vec![serde_json::json!({"type": "text", "text": "hi"})])
        );
    }

    #[test]
    fn test_tool_content_opaque_otherwise() {
        let mixed = serde_json::json!([{"type": "text", "text": "hi"}, {"text": "no type"}]);
        assert!(matches!(ToolContent::from_raw(mixed), ToolContent::Opaque(_)));

        let object = serde_json::json!({"temperature": 21});
        assert_eq!(
            ToolContent::from_raw(object),
            ToolContent::Opaque("{\"temperature\":21}".into())
        );
    }

    #[test]
    fn test_tool_content_error_shape() {
        let content = ToolContent::error("tool 'x' not found on any connected server");
        assert_eq!(
            content,
            ToolContent::Opaque(
                "{\"error\":\"tool 'x' not found on any connected server\"}".into()
            )
        );
    }

    #[test]
    fn test_tool_content_serializes_untagged() {
        let structured = ToolContent::Structured(vec![serde_json::json!({"type": "text"})]);
        assert_eq!(serde_json::to_string(&structured).unwrap(), "[{\"type\":\"text\"}]");
        let opaque = ToolContent::Opaque("plain".into());
        assert_eq!(serde_json::to_string(&opaque).unwrap(), "\"plain\"");
    }

    #[test]
    fn test_call_tool_result_defaults() {
        let result: CallToolResult = serde_json::from_str("{}").unwrap();
        assert!(!result.is_error);
        assert!(result.content.is_null());
    }

    #[test]
    fn test_server_state_serialization() {
        let state = ServerState::Warming { attempt: 2 };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"state": "warming", "attempt": 2}));
        assert!(!state.is_ready());
    }
}
