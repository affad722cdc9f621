//! Conversation orchestrator: model ⇄ tools loop for one user turn.
//!
//! Each round sends the accumulated messages, the system prompt and the tool
//! catalog to the model. Every tool use in the reply is executed in emission
//! order and answered by a tool result; the loop ends on the first reply with
//! no tool use, whose text is the answer.
//!
//! The streaming variant hands each unit of progress to an `mpsc` sender and
//! waits for the hand-off before doing more work.

use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::inference::{
    ContentBlock, InferenceError, Message, ModelClient, ModelReply, ModelRequest,
    ModelStreamEvent, Role,
};
use crate::mcp_client::SessionRegistry;

use super::catalog::{build_tool_catalog, missing_required};
use super::errors::AgentError;
use super::tool_dispatch::{dispatch_tool, tool_result_block};
use super::types::{AgentEvent, ChatReply, ChatRequest};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Appended to every system prompt.
pub const POLICY_PROMPT: &str = "You are connected to multiple MCP tool servers.\n\
Emit a tool_use whenever it helps, then use the tool_result you receive.";

/// Default bound on model round trips per request.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 16;

// ─── Config ─────────────────────────────────────────────────────────────────

/// The `agent` section of settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

fn default_max_tool_rounds() -> u32 {
    DEFAULT_MAX_TOOL_ROUNDS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// Configured prompt, a blank line, then the tool policy.
pub fn compose_system_prompt(configured: Option<&str>) -> String {
    format!("{}\n\n{}", configured.unwrap_or_default(), POLICY_PROMPT)
        .trim()
        .to_string()
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives one conversation turn at a time against a model and a registry.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    registry: Arc<SessionRegistry>,
    system_prompt: String,
    max_tool_rounds: u32,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<SessionRegistry>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            model,
            registry,
            system_prompt: compose_system_prompt(config.system_prompt.as_deref()),
            max_tool_rounds: config.max_tool_rounds.max(1),
        }
    }

    /// Run one turn, waiting for each model reply as a whole.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AgentError> {
        let span = tracing::info_span!("chat", request_id = %uuid::Uuid::new_v4(), stream = false);
        self.run(request, None).instrument(span).await
    }

    /// Run one turn, handing every text fragment and tool step to `events`.
    ///
    /// If the receiver goes away, the turn stops after the operation in
    /// flight and returns [`AgentError::Cancelled`].
    pub async fn chat_streaming(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<ChatReply, AgentError> {
        let span = tracing::info_span!("chat", request_id = %uuid::Uuid::new_v4(), stream = true);
        self.run(request, Some(&events)).instrument(span).await
    }

    async fn run(
        &self,
        request: ChatRequest,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<ChatReply, AgentError> {
        let tools = build_tool_catalog(&self.registry.list_tools().await?);
        tracing::info!(
            history = request.history.len(),
            tools = tools.len(),
            "starting turn"
        );

        let mut messages = request.history;
        messages.push(Message::user(request.message));
        let mut tools_used = Vec::new();
        let mut rounds = 0u32;

        loop {
            if rounds == self.max_tool_rounds {
                tracing::warn!(rounds, "tool round limit reached");
                return Err(AgentError::ToolRoundLimit { rounds });
            }
            rounds += 1;

            let model_request = ModelRequest {
                system: Some(self.system_prompt.clone()),
                messages: messages.clone(),
                tools: tools.clone(),
            };
            let reply = match events {
                Some(tx) => self.stream_round(&model_request, tx).await?,
                None => self.model.create_message(&model_request).await?,
            };

            let calls = reply.tool_uses();
            if calls.is_empty() {
                let response = reply.text();
                tracing::info!(rounds, tools_used = tools_used.len(), "turn complete");
                return Ok(ChatReply {
                    response,
                    tools_used,
                });
            }

            for call in calls {
                tools_used.push(call.name.clone());

                let missing_params = missing_required(&tools, &call.name, &call.input);
                if !missing_params.is_empty() {
                    tracing::warn!(
                        tool = %call.name,
                        missing = ?missing_params,
                        "tool call is missing required arguments, calling anyway"
                    );
                }
                emit(
                    events,
                    AgentEvent::ToolStart {
                        name: call.name.clone(),
                        input: call.input.clone(),
                        missing_params,
                    },
                )
                .await?;

                let outcome = dispatch_tool(&self.registry, &call).await;

                messages.push(Message::blocks(
                    Role::Assistant,
                    vec![ContentBlock::from(call.clone())],
                ));
                messages.push(Message::blocks(
                    Role::User,
                    vec![tool_result_block(&call, &outcome)],
                ));

                emit(
                    events,
                    AgentEvent::ToolResult {
                        name: call.name,
                        outcome,
                    },
                )
                .await?;
            }
        }
    }

    /// One streamed round trip. Text fragments are forwarded as they arrive.
    async fn stream_round(
        &self,
        request: &ModelRequest,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<ModelReply, AgentError> {
        let mut stream = self.model.stream_message(request).await?;

        while let Some(event) = stream.next().await {
            match event? {
                ModelStreamEvent::TextDelta(text) => {
                    emit(Some(events), AgentEvent::Text(text)).await?;
                }
                ModelStreamEvent::ToolUse(call) => {
                    tracing::debug!(tool = %call.name, "model emitted tool use");
                }
                ModelStreamEvent::Completed(reply) => return Ok(reply),
            }
        }

        Err(AgentError::Inference(InferenceError::StreamError {
            reason: "stream ended without a completed reply".into(),
        }))
    }
}

/// Hand one event to the receiver, if streaming.
async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) -> Result<(), AgentError> {
    match events {
        Some(tx) => tx.send(event).await.map_err(|_| AgentError::Cancelled),
        None => Ok(()),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
