//! Session registry: the set of booted sessions and tool dispatch across them.
//!
//! All tool operations run under one async exclusion lock, so at most one
//! `list_tools` / `call_tool` / `close` touches the sessions at a time. Tool
//! lists are never cached: each call re-queries the live sessions, and a
//! name exposed by several servers resolves to the first in configuration
//! order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;

use super::config::ServerSpec;
use super::errors::McpError;
use super::lifecycle::{boot_all, BootPolicy, ServerStatus, SessionConnector, StatusBoard};
use super::session::ToolSession;
use super::types::{ToolCallOutput, ToolContent, ToolDescriptor};

// ─── SessionRegistry ─────────────────────────────────────────────────────────

/// Owns every ready session for one configuration.
pub struct SessionRegistry {
    specs: Vec<ServerSpec>,
    policy: BootPolicy,
    inner: Mutex<Inner>,
    initialized: AtomicBool,
    board: Arc<StatusBoard>,
}

#[derive(Default)]
struct Inner {
    /// Ready sessions in configuration order.
    sessions: Vec<(String, Box<dyn ToolSession>)>,
    closed: bool,
}

/// Serializable registry summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryHealth {
    pub initialized: bool,
    pub configured: usize,
    pub ready: usize,
    pub servers: Vec<ServerStatus>,
}

impl SessionRegistry {
    pub fn new(specs: Vec<ServerSpec>, policy: BootPolicy) -> Self {
        let board = Arc::new(StatusBoard::new(&specs));
        Self {
            specs,
            policy,
            inner: Mutex::new(Inner::default()),
            initialized: AtomicBool::new(false),
            board,
        }
    }

    /// Boot every configured server concurrently.
    ///
    /// Returns once each server is ready or has failed; failures are logged,
    /// never fatal. Calling it again after a successful boot is a no-op.
    pub async fn boot(&self, connector: Arc<dyn SessionConnector>) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(McpError::RegistryClosed);
        }
        if self.is_initialized() {
            return Ok(());
        }

        tracing::info!(servers = self.specs.len(), "booting tool servers");
        let sessions = boot_all(&self.specs, connector, self.policy, self.board.clone()).await;

        tracing::info!(
            ready = sessions.len(),
            configured = self.specs.len(),
            "tool servers booted"
        );
        inner.sessions = sessions;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Configured server names, in configuration order.
    pub fn server_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn server_statuses(&self) -> Vec<ServerStatus> {
        self.board.snapshot()
    }

    pub fn health(&self) -> RegistryHealth {
        let servers = self.server_statuses();
        RegistryHealth {
            initialized: self.is_initialized(),
            configured: self.specs.len(),
            ready: servers.iter().filter(|s| s.state.is_ready()).count(),
            servers,
        }
    }

    /// Tools across every ready session: server order, then each server's order.
    ///
    /// Duplicate names are kept and logged. A session whose listing fails is
    /// logged and skipped.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let inner = self.lock_ready().await?;

        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        for (server, session) in &inner.sessions {
            match session.list_tools().await {
                Ok(listed) => {
                    for tool in listed {
                        if !seen.insert(tool.name.clone()) {
                            tracing::warn!(
                                server = %server,
                                tool = %tool.name,
                                "duplicate tool name, earlier server wins on call"
                            );
                        }
                        tools.push(tool);
                    }
                }
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "skipping server, tool listing failed");
                }
            }
        }
        Ok(tools)
    }

    /// Forward a call to the first ready session exposing `name`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, McpError> {
        let inner = self.lock_ready().await?;

        for (server, session) in &inner.sessions {
            let tools = match session.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "skipping server, tool listing failed");
                    continue;
                }
            };
            if !tools.iter().any(|t| t.name == name) {
                continue;
            }

            tracing::debug!(server = %server, tool = name, "dispatching tool call");
            let result = session.call_tool(name, arguments).await?;
            return Ok(ToolCallOutput {
                server: server.clone(),
                content: ToolContent::from_raw(result.content),
                is_error: result.is_error,
            });
        }

        Err(McpError::ToolNotFound {
            name: name.to_string(),
        })
    }

    /// Tear down every session exactly once. Idempotent and infallible.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        self.initialized.store(false, Ordering::SeqCst);

        for (server, session) in inner.sessions.drain(..) {
            match session.close().await {
                Ok(()) => tracing::debug!(server = %server, "session closed"),
                Err(e) => tracing::warn!(server = %server, error = %e, "session teardown failed"),
            }
        }
        tracing::info!("registry closed");
    }

    async fn lock_ready(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>, McpError> {
        let inner = self.inner.lock().await;
        if inner.closed {
            return Err(McpError::RegistryClosed);
        }
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }
        Ok(inner)
    }
}

// ─── RegistrySlot ────────────────────────────────────────────────────────────

/// The single swap point for the live registry.
///
/// Each request clones the current `Arc` and keeps it for its whole duration;
/// a reload installs a fresh registry and then closes the old one.
#[derive(Default)]
pub struct RegistrySlot {
    current: RwLock<Option<Arc<SessionRegistry>>>,
}

impl RegistrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Result<Arc<SessionRegistry>, McpError> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(McpError::NotInitialized)
    }

    /// Swap in `registry`, then close the one it replaces.
    pub async fn install(&self, registry: Arc<SessionRegistry>) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(registry);

        if let Some(previous) = previous {
            previous.close().await;
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
