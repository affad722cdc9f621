//! MCP Client: sessions with any number of tool servers.
//!
//! This module handles:
//! - Resolving the `mcpServers` config into typed server specs
//! - JSON-RPC 2.0 over a child process's stdio or over HTTP + SSE
//! - Booting every server concurrently with bounded retry
//! - Tool discovery and first-match dispatch across servers
//! - Teardown, and swapping in a freshly booted registry

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod testing;

// Re-exports for convenience
pub use config::{load_server_specs, parse_server_specs, ServerSpec, TransportSpec};
pub use errors::McpError;
pub use lifecycle::{BootPolicy, McpConnector, ServerStatus, SessionConnector};
pub use registry::{RegistryHealth, RegistrySlot, SessionRegistry};
pub use session::{McpSession, ToolSession};
pub use types::{ServerState, ToolArgument, ToolCallOutput, ToolContent, ToolDescriptor};
