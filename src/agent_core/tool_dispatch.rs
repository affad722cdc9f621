//! Tool dispatch: runs one model tool use against the registry.
//!
//! Never fails: every registry error becomes error content so the model can
//! see what went wrong and carry on. "Not found" and "found but failed" read
//! differently so the model can tell them apart.

use std::time::Instant;

use crate::inference::{ContentBlock, ToolUse};
use crate::mcp_client::{SessionRegistry, ToolContent};

use super::types::ToolOutcome;

/// Execute one tool use and normalize whatever comes back.
pub async fn dispatch_tool(registry: &SessionRegistry, call: &ToolUse) -> ToolOutcome {
    let start = Instant::now();

    match registry.call_tool(&call.name, call.input.clone()).await {
        Ok(output) => {
            tracing::info!(
                tool = %call.name,
                server = %output.server,
                is_error = output.is_error,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "tool call completed"
            );
            ToolOutcome {
                content: output.content,
                is_error: output.is_error,
            }
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!(tool = %call.name, "model requested an unknown tool");
            ToolOutcome {
                content: ToolContent::error(e.to_string()),
                is_error: true,
            }
        }
        Err(e) => {
            tracing::warn!(
                tool = %call.name,
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "tool call failed"
            );
            ToolOutcome {
                content: ToolContent::error(format!("tool '{}' failed: {e}", call.name)),
                is_error: true,
            }
        }
    }
}

/// The tool-result block answering `call`.
pub fn tool_result_block(call: &ToolUse, outcome: &ToolOutcome) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call.id.clone(),
        content: outcome.content.clone(),
        is_error: outcome.is_error,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
