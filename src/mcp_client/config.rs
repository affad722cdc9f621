//! Server configuration: resolve the consumed `mcpServers` map into typed specs.
//!
//! The map is produced by an external collaborator. Each entry is either a
//! local subprocess (`{command, args?, env?}`) or a remote streamed endpoint
//! (`{url}`). The shape is decided once, here; anything else is rejected.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::errors::McpError;

// ─── Specs ───────────────────────────────────────────────────────────────────

/// One configured tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Unique key within the registry.
    pub name: String,
    pub transport: TransportSpec,
}

/// How to reach a tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    /// Spawn a child process and speak over its standard streams.
    Subprocess {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Open a server-streamed HTTP connection.
    Streamed { url: String },
}

impl TransportSpec {
    /// Short label for logs and health output.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportSpec::Subprocess { .. } => "local",
            TransportSpec::Streamed { .. } => "hosted",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubprocessEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StreamedEntry {
    url: String,
}

impl ServerSpec {
    /// Resolve one raw entry.
    ///
    /// Exactly one of `command` / `url` must be present.
    pub fn from_entry(name: &str, entry: &serde_json::Value) -> Result<Self, McpError> {
        let obj = entry.as_object().ok_or_else(|| McpError::ConfigError {
            reason: format!("server '{name}' must be an object"),
        })?;

        let has_command = obj.contains_key("command");
        let has_url = obj.contains_key("url");

        let transport = match (has_command, has_url) {
            (true, false) => {
                let parsed: SubprocessEntry =
                    serde_json::from_value(entry.clone()).map_err(|e| McpError::ConfigError {
                        reason: format!("server '{name}': invalid subprocess entry: {e}"),
                    })?;
                if parsed.command.trim().is_empty() {
                    return Err(McpError::ConfigError {
                        reason: format!("server '{name}': empty command"),
                    });
                }
                TransportSpec::Subprocess {
                    command: parsed.command,
                    args: parsed.args,
                    env: parsed.env.unwrap_or_default(),
                }
            }
            (false, true) => {
                let parsed: StreamedEntry =
                    serde_json::from_value(entry.clone()).map_err(|e| McpError::ConfigError {
                        reason: format!("server '{name}': invalid streamed entry: {e}"),
                    })?;
                reqwest::Url::parse(&parsed.url).map_err(|e| McpError::ConfigError {
                    reason: format!("server '{name}': invalid url '{}': {e}", parsed.url),
                })?;
                TransportSpec::Streamed { url: parsed.url }
            }
            (true, true) => {
                return Err(McpError::ConfigError {
                    reason: format!("server '{name}' has both command and url"),
                })
            }
            (false, false) => {
                return Err(McpError::ConfigError {
                    reason: format!("server '{name}' has no command or url"),
                })
            }
        };

        Ok(Self {
            name: name.to_string(),
            transport,
        })
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Parse a servers document.
///
/// Accepts `{"mcpServers": {...}}` or the bare name → entry map. Order of
/// entries is preserved; it becomes the registry's iteration order.
pub fn parse_server_specs(json: &str) -> Result<Vec<ServerSpec>, McpError> {
    let doc: serde_json::Value = serde_json::from_str(json).map_err(|e| McpError::ConfigError {
        reason: format!("failed to parse servers config: {e}"),
    })?;

    let servers = doc
        .get("mcpServers")
        .unwrap_or(&doc)
        .as_object()
        .ok_or_else(|| McpError::ConfigError {
            reason: "servers config must be an object".into(),
        })?;

    servers
        .iter()
        .map(|(name, entry)| ServerSpec::from_entry(name, entry))
        .collect()
}

/// Load server specs from a file. A missing file yields an empty list.
pub fn load_server_specs(path: &Path) -> Result<Vec<ServerSpec>, McpError> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "servers config not found, starting with no tool servers"
        );
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| McpError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    parse_server_specs(&raw)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
