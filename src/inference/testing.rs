//! Scripted model client for orchestrator and relay tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use super::client::{ModelClient, ModelEventStream};
use super::errors::InferenceError;
use super::types::{ContentBlock, ModelReply, ModelRequest, ModelStreamEvent};

enum Step {
    Reply(ModelReply),
    Fail(String),
    Panic,
}

/// Plays back a fixed sequence of replies and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_reply(self, reply: ModelReply) -> Self {
        self.steps.lock().unwrap().push_back(Step::Reply(reply));
        self
    }

    /// The next round trip fails with HTTP 500.
    pub fn then_fail(self, body: &str) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(body.to_string()));
        self
    }

    pub fn then_panic(self) -> Self {
        self.steps.lock().unwrap().push_back(Step::Panic);
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ModelRequest) -> Result<ModelReply, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(body)) => Err(InferenceError::HttpError { status: 500, body }),
            Some(Step::Panic) => panic!("scripted model panic"),
            None => Err(InferenceError::ApiError {
                kind: "script_exhausted".into(),
                message: "no scripted reply left".into(),
            }),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn create_message(&self, request: &ModelRequest) -> Result<ModelReply, InferenceError> {
        self.next(request)
    }

    async fn stream_message(
        &self,
        request: &ModelRequest,
    ) -> Result<ModelEventStream, InferenceError> {
        let reply = self.next(request)?;
        let mut events: Vec<Result<ModelStreamEvent, InferenceError>> = Vec::new();
        for block in &reply.content {
            if let ContentBlock::Text { text } = block {
                events.push(Ok(ModelStreamEvent::TextDelta(text.clone())));
            }
        }
        for call in reply.tool_uses() {
            events.push(Ok(ModelStreamEvent::ToolUse(call)));
        }
        events.push(Ok(ModelStreamEvent::Completed(reply)));
        Ok(futures::stream::iter(events).boxed())
    }
}

pub fn text_reply(text: &str) -> ModelReply {
    ModelReply {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some("end_turn".into()),
    }
}

pub fn tool_reply(calls: &[(&str, &str, serde_json::Value)]) -> ModelReply {
    ModelReply {
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect(),
        stop_reason: Some("tool_use".into()),
    }
}
