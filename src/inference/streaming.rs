//! Streamed Messages API reply parser.
//!
//! Reads the response body as a byte stream, splits it into SSE events, and
//! assembles content blocks as their deltas arrive:
//! - `text_delta` fragments are surfaced immediately
//! - `input_json_delta` fragments are buffered until the tool-use block
//!   closes, then surfaced as one complete tool use
//! - `message_stop` surfaces the fully assembled reply

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ContentBlock, ModelReply, ModelStreamEvent, ToolUse};
use crate::sse::{SseDecoder, SseEvent};

// ─── Stream ──────────────────────────────────────────────────────────────────

/// Parse a streamed HTTP body into `ModelStreamEvent`s.
///
/// The stream ends after `Completed`, or with an error if the body ends
/// before `message_stop` or the endpoint sends an `error` event.
pub fn parse_event_stream<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<ModelStreamEvent, InferenceError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        assembler: ReplyAssembler::default(),
        queue: VecDeque::new(),
        eof: false,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.queue.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }

            // Drain complete events already buffered.
            let next = if st.eof {
                st.decoder.finish()
            } else {
                st.decoder.next_event()
            };
            if let Some(event) = next {
                match st.assembler.process(&event) {
                    Ok(events) => st.queue.extend(events),
                    Err(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
                if st.assembler.finished {
                    st.done = true;
                }
                continue;
            }

            if st.eof {
                st.done = true;
                return Some((
                    Err(InferenceError::StreamError {
                        reason: "stream ended before message_stop".into(),
                    }),
                    st,
                ));
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => st.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((
                        Err(InferenceError::StreamError {
                            reason: format!("stream read error: {e}"),
                        }),
                        st,
                    ));
                }
                None => st.eof = true,
            }
        }
    })
}

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    assembler: ReplyAssembler,
    queue: VecDeque<ModelStreamEvent>,
    eof: bool,
    done: bool,
}

/// Parse a non-streamed reply body.
pub fn parse_reply(body: &str) -> Result<ModelReply, InferenceError> {
    serde_json::from_str(body).map_err(|e| InferenceError::StreamError {
        reason: format!("failed to parse reply: {e}"),
    })
}

// ─── Reply Assembler ─────────────────────────────────────────────────────────

enum BlockState {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
    Other,
}

#[derive(Default)]
struct ReplyAssembler {
    blocks: Vec<(u64, BlockState)>,
    stop_reason: Option<String>,
    finished: bool,
}

#[derive(Deserialize)]
struct BlockStart {
    index: u64,
    content_block: serde_json::Value,
}

#[derive(Deserialize)]
struct BlockDelta {
    index: u64,
    delta: Delta,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct BlockStop {
    index: u64,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaBody,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

impl ReplyAssembler {
    fn process(&mut self, event: &SseEvent) -> Result<Vec<ModelStreamEvent>, InferenceError> {
        match event.kind() {
            "content_block_start" => {
                let start: BlockStart = parse_data(event)?;
                let block = match start.content_block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => BlockState::Text(
                        start.content_block["text"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                    ),
                    Some("tool_use") => BlockState::ToolUse {
                        id: start.content_block["id"]
                            .as_str()
                            .filter(|id| !id.is_empty())
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple())),
                        name: start.content_block["name"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                        input_json: String::new(),
                    },
                    _ => BlockState::Other,
                };
                self.blocks.push((start.index, block));
                Ok(Vec::new())
            }
            "content_block_delta" => {
                let delta: BlockDelta = parse_data(event)?;
                let block = self.block_mut(delta.index)?;
                match (block, delta.delta) {
                    (BlockState::Text(text), Delta::TextDelta { text: fragment }) => {
                        text.push_str(&fragment);
                        Ok(vec![ModelStreamEvent::TextDelta(fragment)])
                    }
                    (BlockState::ToolUse { input_json, .. }, Delta::InputJsonDelta { partial_json }) => {
                        input_json.push_str(&partial_json);
                        Ok(Vec::new())
                    }
                    _ => Ok(Vec::new()),
                }
            }
            "content_block_stop" => {
                let stop: BlockStop = parse_data(event)?;
                match self.block_mut(stop.index)? {
                    BlockState::ToolUse {
                        id,
                        name,
                        input_json,
                    } => {
                        let input = parse_tool_input(name, input_json)?;
                        Ok(vec![ModelStreamEvent::ToolUse(ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input,
                        })])
                    }
                    _ => Ok(Vec::new()),
                }
            }
            "message_delta" => {
                let delta: MessageDelta = parse_data(event)?;
                if delta.delta.stop_reason.is_some() {
                    self.stop_reason = delta.delta.stop_reason;
                }
                Ok(Vec::new())
            }
            "message_stop" => {
                self.finished = true;
                let reply = self.assemble()?;
                Ok(vec![ModelStreamEvent::Completed(reply)])
            }
            "error" => {
                let payload: serde_json::Value = parse_data(event)?;
                Err(InferenceError::from_api_payload(&payload))
            }
            // message_start, ping, and anything newer.
            _ => Ok(Vec::new()),
        }
    }

    fn block_mut(&mut self, index: u64) -> Result<&mut BlockState, InferenceError> {
        self.blocks
            .iter_mut()
            .find(|(i, _)| *i == index)
            .map(|(_, block)| block)
            .ok_or_else(|| InferenceError::StreamError {
                reason: format!("delta for unknown content block {index}"),
            })
    }

    fn assemble(&mut self) -> Result<ModelReply, InferenceError> {
        let mut blocks = std::mem::take(&mut self.blocks);
        blocks.sort_by_key(|(index, _)| *index);

        let mut content = Vec::with_capacity(blocks.len());
        for (_, block) in blocks {
            match block {
                BlockState::Text(text) => content.push(ContentBlock::Text { text }),
                BlockState::ToolUse {
                    id,
                    name,
                    input_json,
                } => {
                    let input = parse_tool_input(&name, &input_json)?;
                    content.push(ContentBlock::ToolUse { id, name, input });
                }
                BlockState::Other => {}
            }
        }

        Ok(ModelReply {
            content,
            stop_reason: self.stop_reason.take(),
        })
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(event: &SseEvent) -> Result<T, InferenceError> {
    serde_json::from_str(&event.data).map_err(|e| InferenceError::StreamError {
        reason: format!("failed to parse {} event: {e} (data: {})", event.kind(), event.data),
    })
}

/// Tool input arrives as JSON fragments; no fragments means `{}`.
fn parse_tool_input(name: &str, raw: &str) -> Result<serde_json::Value, InferenceError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| InferenceError::StreamError {
        reason: format!("malformed input for tool '{name}': {e}"),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
