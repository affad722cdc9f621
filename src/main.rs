//! mcp-relay: command-line front end.
//!
//! Every subcommand boots a session registry from the configured servers
//! file, does its work, and closes the registry before exiting. Logs go to
//! the log directory (stderr if it is unwritable); stdout carries only
//! results and relay frames.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use mcp_relay::agent_core::{ChatRequest, Orchestrator};
use mcp_relay::inference::{AnthropicClient, Message};
use mcp_relay::mcp_client::{load_server_specs, McpConnector, SessionRegistry};
use mcp_relay::relay::{relay_chat, write_events};
use mcp_relay::settings::{resolve_settings_path, Settings};

#[derive(Parser)]
#[command(
    name = "mcp-relay",
    version,
    about = "Multi-server MCP tool relay for Claude conversations"
)]
struct Cli {
    /// Settings file. Defaults to $MCP_RELAY_CONFIG, then the data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log directory. Defaults to $MCP_RELAY_LOG_DIR, then the data directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one conversation turn against the connected tools.
    Chat {
        message: String,

        /// JSON file holding prior messages.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the final reply as JSON instead of streaming frames.
        #[arg(long)]
        no_stream: bool,
    },
    /// List every tool the ready servers expose.
    Tools,
    /// Invoke one tool directly.
    Call {
        name: String,

        /// Tool arguments as a JSON object.
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Boot every server and report its state.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mcp_relay::init_tracing(&mcp_relay::resolve_log_dir(cli.log_dir.as_deref()));

    let settings_path = resolve_settings_path(cli.config.as_deref());
    let settings = Settings::load(&settings_path).context("failed to load settings")?;

    let registry = Arc::new(boot_registry(&settings).await?);
    let outcome = run(cli.command, &settings, Arc::clone(&registry)).await;
    registry.close().await;

    if let Err(ref e) = outcome {
        tracing::error!(error = %format!("{e:#}"), "command failed");
    }
    outcome
}

async fn boot_registry(settings: &Settings) -> Result<SessionRegistry> {
    let specs = load_server_specs(&settings.servers_file).with_context(|| {
        format!(
            "failed to load MCP servers from {}",
            settings.servers_file.display()
        )
    })?;
    let registry = SessionRegistry::new(specs, settings.boot_policy());
    registry
        .boot(Arc::new(McpConnector::new()))
        .await
        .context("failed to boot session registry")?;
    Ok(registry)
}

async fn run(command: Command, settings: &Settings, registry: Arc<SessionRegistry>) -> Result<()> {
    match command {
        Command::Chat {
            message,
            history,
            no_stream,
        } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let request = ChatRequest::new(message).with_history(history);

            let model = AnthropicClient::new(settings.model.clone())
                .context("invalid model configuration")?;
            let orchestrator = Orchestrator::new(Arc::new(model), registry, &settings.agent);

            if no_stream {
                let reply = orchestrator.chat(request).await?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                let events = relay_chat(Arc::new(orchestrator), request);
                let mut stdout = tokio::io::stdout();
                write_events(events, &mut stdout)
                    .await
                    .context("failed to write events")?;
            }
        }
        Command::Tools => {
            let tools = registry.list_tools().await?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Command::Call { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("tool arguments must be valid JSON")?;
            let output = registry.call_tool(&name, args).await?;
            let rendered = json!({
                "server": output.server,
                "content": output.content.to_value(),
                "is_error": output.is_error,
            });
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::Health => {
            println!("{}", serde_json::to_string_pretty(&registry.health())?);
        }
    }
    Ok(())
}

fn read_history(path: &std::path::Path) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("history file {} is not a message list", path.display()))
}
