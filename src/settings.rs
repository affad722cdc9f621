//! Application settings loaded from `settings.yaml`.
//!
//! The file is read as text, `${VAR}` / `${VAR:-default}` references are
//! substituted from the environment, and the result is parsed with
//! `serde_yaml`. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::agent_core::AgentConfig;
use crate::inference::ModelConfig;
use crate::mcp_client::BootPolicy;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "MCP_RELAY_CONFIG";

/// Fallback for an empty `model.api_key`.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_SERVERS_FILE: &str = "mcp-servers.json";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("invalid settings file {path}: {reason}")]
    ParseFailed { path: String, reason: String },
}

// ─── Types ───────────────────────────────────────────────────────────────────

/// The `boot` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootSettings {
    pub boot_timeout_secs: u64,
    pub init_timeout_secs: u64,
    pub retry_backoff_ms: u64,
}

impl Default for BootSettings {
    fn default() -> Self {
        let policy = BootPolicy::default();
        Self {
            boot_timeout_secs: policy.boot_timeout.as_secs(),
            init_timeout_secs: policy.init_timeout.as_secs(),
            retry_backoff_ms: policy.retry_backoff.as_millis() as u64,
        }
    }
}

impl From<&BootSettings> for BootPolicy {
    fn from(boot: &BootSettings) -> Self {
        BootPolicy {
            boot_timeout: Duration::from_secs(boot.boot_timeout_secs),
            init_timeout: Duration::from_secs(boot.init_timeout_secs),
            retry_backoff: Duration::from_millis(boot.retry_backoff_ms),
        }
    }
}

/// Everything the binary needs to boot a registry and talk to the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// MCP servers JSON. Relative paths resolve against the settings file.
    pub servers_file: PathBuf,
    pub model: ModelConfig,
    pub boot: BootSettings,
    pub agent: AgentConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            servers_file: PathBuf::from(DEFAULT_SERVERS_FILE),
            model: ModelConfig::default(),
            boot: BootSettings::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Settings {
    pub fn boot_policy(&self) -> BootPolicy {
        BootPolicy::from(&self.boot)
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            Self::parse(&raw).map_err(|reason| SettingsError::ParseFailed {
                path: path.display().to_string(),
                reason,
            })?
        } else {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            Self::default()
        };

        if settings.model.api_key.trim().is_empty() {
            settings.model.api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        }

        let servers_file = PathBuf::from(expand_tilde(&settings.servers_file.to_string_lossy()));
        settings.servers_file = if servers_file.is_relative() {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(servers_file)
        } else {
            servers_file
        };

        tracing::info!(
            path = %path.display(),
            servers_file = %settings.servers_file.display(),
            model = %settings.model.model,
            "settings loaded"
        );
        Ok(settings)
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let interpolated = interpolate_env_vars(raw);
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&interpolated).map_err(|e| e.to_string())
    }
}

/// `--config`, then `$MCP_RELAY_CONFIG`, then `<data_dir>/settings.yaml`.
pub fn resolve_settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(expand_tilde(&path.to_string_lossy()));
    }
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(expand_tilde(&path));
        }
    }
    crate::data_dir().join("settings.yaml")
}

// ─── Interpolation ───────────────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` with environment values.
///
/// An unset variable without a default becomes the empty string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
