//! In-process fake servers for registry and orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::config::{ServerSpec, TransportSpec};
use super::errors::McpError;
use super::lifecycle::{BootPolicy, SessionConnector};
use super::session::ToolSession;
use super::types::{CallToolResult, ToolArgument, ToolDescriptor};

/// Millisecond-scale timings so failing boots resolve quickly.
pub fn fast_policy() -> BootPolicy {
    BootPolicy {
        boot_timeout: Duration::from_millis(300),
        init_timeout: Duration::from_millis(50),
        retry_backoff: Duration::from_millis(5),
    }
}

pub fn local_spec(name: &str) -> ServerSpec {
    ServerSpec {
        name: name.to_string(),
        transport: TransportSpec::Subprocess {
            command: format!("{name}-server"),
            args: Vec::new(),
            env: HashMap::new(),
        },
    }
}

#[derive(Clone)]
enum Behavior {
    /// Return `[{"type":"text","text": args.text}]`.
    Echo,
    /// Fail the call with a JSON-RPC error.
    Throw(String),
    /// Return this raw content.
    Reply(Value),
    /// Return this content flagged `isError`.
    ErrorResult(Value),
}

#[derive(Default)]
struct Stats {
    initialize_calls: AtomicU32,
    close_calls: AtomicU32,
    list_fails: AtomicBool,
    calls: Mutex<Vec<(String, Value)>>,
}

/// A scriptable server. Clones share call statistics.
#[derive(Clone)]
pub struct FakeServer {
    name: String,
    tools: Vec<(ToolDescriptor, Behavior)>,
    initialize_failures: u32,
    hang_initialize: bool,
    stats: Arc<Stats>,
}

impl FakeServer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            initialize_failures: 0,
            hang_initialize: false,
            stats: Arc::new(Stats::default()),
        }
    }

    fn with_tool(mut self, tool: ToolDescriptor, behavior: Behavior) -> Self {
        self.tools.push((tool, behavior));
        self
    }

    /// A tool taking a required `text` argument and echoing it back.
    pub fn with_echo(self, tool: &str) -> Self {
        let descriptor = ToolDescriptor {
            name: tool.to_string(),
            description: "Echo the given text".into(),
            arguments: vec![ToolArgument {
                name: "text".into(),
                semantic_type: "str".into(),
                required: None,
                description: "Text to echo".into(),
            }],
        };
        self.with_tool(descriptor, Behavior::Echo)
    }

    pub fn with_descriptor(self, descriptor: ToolDescriptor, reply: Value) -> Self {
        self.with_tool(descriptor, Behavior::Reply(reply))
    }

    pub fn with_reply(self, tool: &str, reply: Value) -> Self {
        self.with_tool(bare(tool), Behavior::Reply(reply))
    }

    pub fn with_throwing(self, tool: &str, message: &str) -> Self {
        self.with_tool(bare(tool), Behavior::Throw(message.to_string()))
    }

    pub fn with_error_result(self, tool: &str, content: Value) -> Self {
        self.with_tool(bare(tool), Behavior::ErrorResult(content))
    }

    /// Fail the first `n` initialize attempts.
    pub fn failing_initialize(mut self, n: u32) -> Self {
        self.initialize_failures = n;
        self
    }

    /// Never answer initialize.
    pub fn hanging_initialize(mut self) -> Self {
        self.hang_initialize = true;
        self
    }

    /// Make later `list_tools` calls fail.
    pub fn break_listing(&self) {
        self.stats.list_fails.store(true, Ordering::SeqCst);
    }

    pub fn initialize_calls(&self) -> u32 {
        self.stats.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.stats.close_calls.load(Ordering::SeqCst)
    }

    /// Tool calls received, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.stats.calls.lock().unwrap().clone()
    }
}

fn bare(tool: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.to_string(),
        description: String::new(),
        arguments: Vec::new(),
    }
}

#[async_trait]
impl ToolSession for FakeServer {
    async fn initialize(&self) -> Result<(), McpError> {
        let n = self.stats.initialize_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_initialize {
            std::future::pending::<()>().await;
        }
        if n <= self.initialize_failures {
            return Err(McpError::TransportError {
                server: self.name.clone(),
                reason: format!("not ready yet (attempt {n})"),
            });
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        if self.stats.list_fails.load(Ordering::SeqCst) {
            return Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "listing broken".into(),
            });
        }
        Ok(self.tools.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        self.stats
            .calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));

        let behavior = self
            .tools
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| McpError::ServerError {
                code: -32601,
                message: format!("unknown tool {name}"),
                data: None,
            })?;

        match behavior {
            Behavior::Echo => Ok(CallToolResult {
                content: json!([{"type": "text", "text": arguments["text"]}]),
                is_error: false,
            }),
            Behavior::Throw(message) => Err(McpError::ServerError {
                code: -32603,
                message,
                data: None,
            }),
            Behavior::Reply(content) => Ok(CallToolResult {
                content,
                is_error: false,
            }),
            Behavior::ErrorResult(content) => Ok(CallToolResult {
                content,
                is_error: true,
            }),
        }
    }

    async fn close(&self) -> Result<(), McpError> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out pre-built fake servers by name; unknown names fail to spawn.
#[derive(Default)]
pub struct FakeConnector {
    servers: HashMap<String, FakeServer>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: FakeServer) -> Self {
        self.servers.insert(server.name.clone(), server);
        self
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, spec: &ServerSpec) -> Result<Box<dyn ToolSession>, McpError> {
        match self.servers.get(&spec.name) {
            Some(server) => Ok(Box::new(server.clone())),
            None => Err(McpError::SpawnFailed {
                name: spec.name.clone(),
                reason: "no such fake server".into(),
            }),
        }
    }
}
