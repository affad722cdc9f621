//! One MCP session over an open transport.
//!
//! The registry only ever talks to sessions through [`ToolSession`], so tests
//! can substitute in-process fakes for real servers.

use async_trait::async_trait;

use super::errors::McpError;
use super::transport::{extract_result, Transport};
use super::types::{
    CallToolResult, InitializeResult, ListToolsPage, ToolDescriptor, PROTOCOL_VERSION,
};

/// Guard against servers that keep returning a cursor.
const MAX_LIST_PAGES: usize = 64;

// ─── ToolSession ─────────────────────────────────────────────────────────────

/// The operations the registry needs from a connected server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Perform the protocol handshake.
    async fn initialize(&self) -> Result<(), McpError>;

    /// Fetch the server's current tool list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invoke one tool.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError>;

    /// Release the underlying transport.
    async fn close(&self) -> Result<(), McpError>;

    /// Extra context for failure messages (e.g. captured stderr).
    fn diagnostics(&self) -> String {
        String::new()
    }
}

// ─── McpSession ──────────────────────────────────────────────────────────────

/// A [`ToolSession`] speaking MCP over a real transport.
pub struct McpSession {
    server_name: String,
    transport: Transport,
}

impl McpSession {
    pub fn new(server_name: &str, transport: Transport) -> Self {
        Self {
            server_name: server_name.to_string(),
            transport,
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let response = self.transport.request(method, params).await?;
        extract_result(response)
    }

    fn parse<T: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        value: serde_json::Value,
    ) -> Result<T, McpError> {
        serde_json::from_value(value).map_err(|e| McpError::TransportError {
            server: self.server_name.clone(),
            reason: format!("failed to parse {what} response: {e}"),
        })
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn initialize(&self) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result = self.call("initialize", Some(params)).await?;
        let init: InitializeResult = self.parse("initialize", result)?;

        tracing::debug!(
            server = %self.server_name,
            protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
            remote_name = init
                .server_info
                .as_ref()
                .and_then(|info| info.name.as_deref())
                .unwrap_or("unknown"),
            remote_version = init
                .server_info
                .as_ref()
                .and_then(|info| info.version.as_deref())
                .unwrap_or("unknown"),
            "handshake complete"
        );

        self.transport
            .notify("notifications/initialized", None)
            .await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .take()
                .map(|c| serde_json::json!({ "cursor": c }));
            let result = self.call("tools/list", params).await?;
            let page: ListToolsPage = self.parse("tools/list", result)?;

            tools.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(
            server = %self.server_name,
            pages = MAX_LIST_PAGES,
            "tool listing truncated, server kept returning a cursor"
        );
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let result = self.call("tools/call", Some(params)).await?;
        self.parse("tools/call", result)
    }

    async fn close(&self) -> Result<(), McpError> {
        self.transport.close().await
    }

    fn diagnostics(&self) -> String {
        self.transport.diagnostics()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
