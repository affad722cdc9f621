//! Shared types for the inference client.
//!
//! These map the Anthropic Messages API wire format. Request types derive
//! `Serialize`, response types derive `Deserialize`; the conversation types
//! derive both because history is round-tripped through the caller.

use serde::{Deserialize, Serialize};

use crate::mcp_client::ToolContent;

// ─── Conversation ────────────────────────────────────────────────────────────

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message body: plain text or a list of typed blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed content block.
///
/// Kinds this client acts on are modelled; anything else (`image`,
/// `document`, `thinking`, ...) is kept verbatim so caller history is sent
/// back exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: ToolContent,
        is_error: bool,
    },
    Raw(serde_json::Value),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlockRef<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a serde_json::Value,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a ToolContent,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: ToolContent,
        #[serde(default)]
        is_error: bool,
    },
}

impl Serialize for ContentBlock {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentBlock::Text { text } => KnownBlockRef::Text { text }.serialize(serializer),
            ContentBlock::ToolUse { id, name, input } => {
                KnownBlockRef::ToolUse { id, name, input }.serialize(serializer)
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => KnownBlockRef::ToolResult {
                tool_use_id,
                content,
                is_error: *is_error,
            }
            .serialize(serializer),
            ContentBlock::Raw(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value.get("type").and_then(|t| t.as_str()) {
            Some("text" | "tool_use" | "tool_result") => {
                let block = KnownBlock::deserialize(value).map_err(serde::de::Error::custom)?;
                Ok(match block {
                    KnownBlock::Text { text } => ContentBlock::Text { text },
                    KnownBlock::ToolUse { id, name, input } => {
                        ContentBlock::ToolUse { id, name, input }
                    }
                    KnownBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    },
                })
            }
            _ => Ok(ContentBlock::Raw(value)),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl From<ToolUse> for ContentBlock {
    fn from(call: ToolUse) -> Self {
        ContentBlock::ToolUse {
            id: call.id,
            name: call.name,
            input: call.input,
        }
    }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Everything the orchestrator decides about one model round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

/// Request body for `POST /messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub tools: &'a [ToolSchema],
    pub stream: bool,
}

// ─── Response ────────────────────────────────────────────────────────────────

/// A complete model reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl ModelReply {
    /// Concatenation of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool uses in emission order.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// One unit of a streamed reply, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStreamEvent {
    /// A text fragment.
    TextDelta(String),
    /// A fully assembled tool use (emitted when its block closes).
    ToolUse(ToolUse),
    /// The stream finished; carries the assembled reply.
    Completed(ModelReply),
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_text_message_serialization() {
        let msg = Message::user("hello");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "user", "content": "hello"})
        );
    }

    #[test]
    fn test_tool_result_block_serialization() {
        let msg = Message::blocks(
            Role::User,
            vec![ContentBlock::ToolResult {
                tool_use_id: "toolu_1".into(),
                content: ToolContent::Opaque("{\"error\":\"x\"}".into()),
                is_error: false,
            }],
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "toolu_1",
                    "content": "{\"error\":\"x\"}"
                }]
            })
        );
    }

    #[test]
    fn test_error_tool_result_carries_flag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "t".into(),
            content: ToolContent::Structured(vec![json!({"type": "text", "text": "no"})]),
            is_error: true,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["is_error"], true);
        assert_eq!(value["content"][0]["text"], "no");
    }

    #[test]
    fn test_reply_parsing_and_accessors() {
        let reply: ModelReply = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Let me check. "},
                {"type": "thinking", "thinking": "..."},
                {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {"city": "Oslo"}},
                {"type": "text", "text": "Done."}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        assert_eq!(reply.text(), "Let me check. Done.");
        assert_eq!(
            reply.content[1],
            ContentBlock::Raw(json!({"type": "thinking", "thinking": "..."}))
        );
        let uses = reply.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "weather");
        assert_eq!(uses[0].input["city"], "Oslo");
    }

    #[test]
    fn test_history_round_trips() {
        let history = vec![
            Message::user("hi"),
            Message::blocks(
                Role::Assistant,
                vec![ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "echo".into(),
                    input: json!({"text": "hi"}),
                }],
            ),
        ];
        let json = serde_json::to_string(&history).unwrap();
        let back: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn test_unknown_history_blocks_are_sent_back_verbatim() {
        let raw = json!([{
            "role": "user",
            "content": [
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo="}},
                {"type": "text", "text": "What is this?"}
            ]
        }]);
        let history: Vec<Message> = serde_json::from_value(raw.clone()).unwrap();
        match &history[0].content {
            MessageContent::Blocks(blocks) => {
                assert!(matches!(&blocks[0], ContentBlock::Raw(v) if v["type"] == "image"));
                assert!(matches!(&blocks[1], ContentBlock::Text { .. }));
            }
            other => panic!("expected blocks, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&history).unwrap(), raw);
    }

    #[test]
    fn test_malformed_known_block_is_rejected() {
        let result = serde_json::from_value::<ContentBlock>(json!({"type": "tool_use", "name": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_request_omits_empty_tools_and_system() {
        let messages = vec![Message::user("x")];
        let body = MessagesRequest {
            model: "m",
            max_tokens: 10,
            system: None,
            messages: &messages,
            tools: &[],
            stream: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("system").is_none());
    }
}
