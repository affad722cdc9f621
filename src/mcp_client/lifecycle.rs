//! Session boot lifecycle.
//!
//! Each configured server walks `Connecting → Handshaking → Warming → Ready`
//! under one overall deadline. A warm-up attempt is the `initialize`
//! handshake followed by a first `list_tools`; a failed or slow attempt is
//! retried after a fixed backoff until the deadline elapses, at which point
//! the server is `Failed` and its transport is torn down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::{sleep, timeout, timeout_at, Instant};

use super::config::ServerSpec;
use super::errors::McpError;
use super::session::{McpSession, ToolSession};
use super::transport::{format_stderr_suffix, Transport};
use super::types::ServerState;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Overall per-server boot deadline.
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for one warm-up attempt.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between warm-up attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

// ─── BootPolicy ──────────────────────────────────────────────────────────────

/// Timing knobs for booting servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicy {
    pub boot_timeout: Duration,
    pub init_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

// ─── Connectors ──────────────────────────────────────────────────────────────

/// Opens a session for one server spec.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, spec: &ServerSpec) -> Result<Box<dyn ToolSession>, McpError>;
}

/// Connector that opens real stdio / SSE transports.
#[derive(Debug, Clone, Default)]
pub struct McpConnector {
    http: reqwest::Client,
}

impl McpConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionConnector for McpConnector {
    async fn connect(&self, spec: &ServerSpec) -> Result<Box<dyn ToolSession>, McpError> {
        let transport = Transport::open(spec, &self.http).await?;
        Ok(Box::new(McpSession::new(&spec.name, transport)))
    }
}

// ─── Status Board ────────────────────────────────────────────────────────────

/// Observable state of one configured server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    /// `local` or `hosted`.
    pub transport: &'static str,
    #[serde(flatten)]
    pub state: ServerState,
}

/// Shared per-server state table, written by boot tasks.
#[derive(Debug)]
pub struct StatusBoard {
    entries: std::sync::Mutex<Vec<ServerStatus>>,
}

impl StatusBoard {
    /// One `Connecting` entry per spec, in configuration order.
    pub fn new(specs: &[ServerSpec]) -> Self {
        let entries = specs
            .iter()
            .map(|spec| ServerStatus {
                name: spec.name.clone(),
                transport: spec.transport.kind(),
                state: ServerState::Connecting,
            })
            .collect();
        Self {
            entries: std::sync::Mutex::new(entries),
        }
    }

    pub fn set(&self, name: &str, state: ServerState) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.iter_mut().find(|e| e.name == name) {
            entry.state = state;
        }
    }

    pub fn snapshot(&self) -> Vec<ServerStatus> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ─── Booting ─────────────────────────────────────────────────────────────────

/// Boot one server to `Ready`, or fail once the deadline elapses.
///
/// The session is closed before returning an error.
pub async fn boot_server(
    spec: &ServerSpec,
    connector: &dyn SessionConnector,
    policy: BootPolicy,
    board: &StatusBoard,
) -> Result<Box<dyn ToolSession>, McpError> {
    let name = spec.name.as_str();
    let deadline = Instant::now() + policy.boot_timeout;
    let timed_out = || McpError::BootTimeout {
        name: name.to_string(),
        timeout_secs: policy.boot_timeout.as_secs(),
    };

    board.set(name, ServerState::Connecting);
    let session = match timeout_at(deadline, connector.connect(spec)).await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return Err(fail(board, name, e)),
        Err(_) => return Err(fail(board, name, timed_out())),
    };

    board.set(name, ServerState::Handshaking);
    match timeout_at(deadline, warm_up(name, session.as_ref(), policy, board)).await {
        Ok(tool_count) => {
            board.set(name, ServerState::Ready { tool_count });
            tracing::info!(server = name, tools = tool_count, "server ready");
            Ok(session)
        }
        Err(_) => {
            let err = McpError::InitFailed {
                name: name.to_string(),
                reason: format!(
                    "not ready after {}s{}",
                    policy.boot_timeout.as_secs(),
                    format_stderr_suffix(&session.diagnostics())
                ),
            };
            if let Err(e) = session.close().await {
                tracing::warn!(server = name, error = %e, "teardown after failed boot");
            }
            Err(fail(board, name, err))
        }
    }
}

/// Retry `initialize` + `list_tools` until both succeed. Returns the tool count.
async fn warm_up(
    name: &str,
    session: &dyn ToolSession,
    policy: BootPolicy,
    board: &StatusBoard,
) -> usize {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        board.set(name, ServerState::Warming { attempt });

        let result = timeout(policy.init_timeout, async {
            session.initialize().await?;
            session.list_tools().await
        })
        .await;

        match result {
            Ok(Ok(tools)) => return tools.len(),
            Ok(Err(e)) => {
                tracing::warn!(server = name, attempt, error = %e, "warm-up attempt failed");
            }
            Err(_) => {
                tracing::warn!(
                    server = name,
                    attempt,
                    timeout_ms = policy.init_timeout.as_millis() as u64,
                    "warm-up attempt timed out"
                );
            }
        }

        sleep(policy.retry_backoff).await;
    }
}

fn fail(board: &StatusBoard, name: &str, err: McpError) -> McpError {
    tracing::error!(server = name, error = %err, "server failed to boot");
    board.set(
        name,
        ServerState::Failed {
            reason: err.to_string(),
        },
    );
    err
}

/// Boot every spec concurrently, one task per server.
///
/// Returns the ready sessions in configuration order. Failures are logged
/// and recorded on the board; they never abort the other servers.
pub async fn boot_all(
    specs: &[ServerSpec],
    connector: Arc<dyn SessionConnector>,
    policy: BootPolicy,
    board: Arc<StatusBoard>,
) -> Vec<(String, Box<dyn ToolSession>)> {
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = spec.clone();
        let connector = connector.clone();
        let board = board.clone();
        handles.push((
            spec.name.clone(),
            tokio::spawn(async move {
                boot_server(&spec, connector.as_ref(), policy, &board).await
            }),
        ));
    }

    let mut ready = Vec::new();
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(session)) => ready.push((name, session)),
            Ok(Err(_)) => {} // already logged and recorded
            Err(e) => {
                let err = McpError::SpawnFailed {
                    name: name.clone(),
                    reason: format!("boot task failed: {e}"),
                };
                fail(&board, &name, err);
            }
        }
    }
    ready
}

// ─── Tests ───────────────────────────────────────────────────────────────────
