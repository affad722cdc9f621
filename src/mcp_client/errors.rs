//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start or a remote stream could not be opened.
    #[error("failed to open transport for server '{name}': {reason}")]
    SpawnFailed {
        name: String,
        reason: String,
    },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed {
        name: String,
        reason: String,
    },

    /// The overall boot deadline elapsed before the server became ready.
    #[error("server '{name}' boot timed out after {timeout_secs}s")]
    BootTimeout {
        name: String,
        timeout_secs: u64,
    },

    /// JSON-RPC communication error (malformed message, I/O error).
    #[error("transport error for server '{server}': {reason}")]
    TransportError {
        server: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No ready session exposes the requested tool.
    #[error("tool '{name}' not found on any connected server")]
    ToolNotFound {
        name: String,
    },

    /// A request did not complete in time.
    #[error("'{operation}' on server '{server}' timed out after {timeout_ms}ms")]
    Timeout {
        server: String,
        operation: String,
        timeout_ms: u64,
    },

    /// Configuration error (unreadable file, unknown server shape).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },

    /// No registry has been installed yet.
    #[error("MCP registry not initialized")]
    NotInitialized,

    /// The registry has been closed; its sessions are gone.
    #[error("MCP registry is closed")]
    RegistryClosed,
}

impl McpError {
    /// Whether this error means the tool does not exist anywhere (as opposed
    /// to existing and failing).
    pub fn is_not_found(&self) -> bool {
        matches!(self, McpError::ToolNotFound { .. })
    }
}
