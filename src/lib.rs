pub mod agent_core;
pub mod inference;
pub mod mcp_client;
pub mod relay;
pub mod settings;
pub mod sse;

use std::path::{Path, PathBuf};

/// Per-user home for settings and logs: the platform data directory, or
/// `~/.mcp-relay/` where there is none.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("mcp-relay");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp-relay")
}

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "MCP_RELAY_LOG_DIR";

const LOG_FILE: &str = "relay.log";
const LOG_GENERATIONS: u32 = 3;

/// `--log-dir`, then `$MCP_RELAY_LOG_DIR`, then the data directory.
pub fn resolve_log_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => data_dir(),
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to `relay.log` under `log_dir` (previous runs rotated to `.1`
/// through `.3`), keeping stdout free for results and relay frames. If the
/// file cannot be opened the subscriber writes to stderr instead and the
/// failure is logged there. Returns the log file in use, if any.
pub fn init_tracing(log_dir: &Path) -> Option<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcp_relay=info,warn"));
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    match open_log_file(log_dir) {
        Ok((log_path, file)) => {
            builder.with_writer(FlushingWriter::new(file)).init();
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                log_file = %log_path.display(),
                pid = std::process::id(),
                "mcp-relay starting"
            );
            Some(log_path)
        }
        Err(e) => {
            builder.with_writer(std::io::stderr).init();
            tracing::warn!(
                log_dir = %log_dir.display(),
                error = %e,
                "cannot open log file, logging to stderr"
            );
            None
        }
    }
}

/// Create `dir`, rotate old logs, and open a fresh `relay.log`.
fn open_log_file(dir: &Path) -> std::io::Result<(PathBuf, std::fs::File)> {
    std::fs::create_dir_all(dir)?;
    let log_path = dir.join(LOG_FILE);
    rotate_log_file(&log_path, LOG_GENERATIONS);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    Ok((log_path, file))
}

/// Shift `base` to `base.1`, `base.1` to `base.2`, and so on up to `keep`.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// Flushes after every write so a crash loses no log lines.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
