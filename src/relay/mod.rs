//! Event relay: one conversation turn as an ordered caller-facing stream.
//!
//! Every request produces `start`, then the orchestrator's progress in the
//! order it happened, then exactly one terminal sequence: `done`, or `error`
//! followed by `done`. That holds when the orchestrator fails or panics too,
//! since it runs in its own task and the relay inspects the join result.
//!
//! If the caller drops its receiver, emission stops. Work already in flight
//! runs to completion; the orchestrator then sees its own receiver gone and
//! stops.

pub mod events;

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::agent_core::{AgentError, AgentEvent, ChatRequest, Orchestrator};

pub use events::{RelayEvent, Status};

/// Capacity of the caller-facing channel.
const RELAY_BUFFER: usize = 32;

/// Start one streamed turn; events arrive on the returned receiver.
pub fn relay_chat(orchestrator: Arc<Orchestrator>, request: ChatRequest) -> mpsc::Receiver<RelayEvent> {
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(drive(orchestrator, request, tx));
    rx
}

async fn drive(orchestrator: Arc<Orchestrator>, request: ChatRequest, out: mpsc::Sender<RelayEvent>) {
    if out.send(RelayEvent::Start).await.is_err() {
        tracing::debug!("caller gone before start");
        return;
    }

    // Capacity 1: the orchestrator waits on every hand-off.
    let (agent_tx, mut agent_rx) = mpsc::channel::<AgentEvent>(1);
    let worker = tokio::spawn(async move { orchestrator.chat_streaming(request, agent_tx).await });

    let mut tools_used = Vec::new();
    let mut caller_gone = false;
    while let Some(event) = agent_rx.recv().await {
        if let AgentEvent::ToolStart { name, .. } = &event {
            tools_used.push(name.clone());
        }
        if out.send(RelayEvent::from(event)).await.is_err() {
            tracing::info!("caller disconnected, stopping event emission");
            caller_gone = true;
            break;
        }
    }
    drop(agent_rx);

    let terminal = match worker.await {
        Ok(Ok(reply)) => vec![RelayEvent::Done {
            response: reply.response,
            tools_used: reply.tools_used,
            status: Status::Success,
        }],
        Ok(Err(AgentError::Cancelled)) => {
            tracing::debug!("turn cancelled after caller disconnect");
            Vec::new()
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "turn failed");
            failure(e.to_string(), tools_used)
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                "internal error: orchestrator panicked"
            } else {
                "internal error: orchestrator task aborted"
            };
            tracing::error!(error = %join_error, "orchestrator task failed");
            failure(message.to_string(), tools_used)
        }
    };

    if caller_gone {
        return;
    }
    for event in terminal {
        if out.send(event).await.is_err() {
            break;
        }
    }
}

fn failure(message: String, tools_used: Vec<String>) -> Vec<RelayEvent> {
    vec![
        RelayEvent::Error { message },
        RelayEvent::Done {
            response: String::new(),
            tools_used,
            status: Status::Error,
        },
    ]
}

/// Write events as wire frames until `done` or the stream ends.
///
/// Flushes after every frame so the caller sees progress immediately.
pub async fn write_events<W>(mut events: mpsc::Receiver<RelayEvent>, writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        writer.write_all(event.to_frame().as_bytes()).await?;
        writer.flush().await?;
        if event.is_terminal() {
            break;
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
