//! JSON-RPC transports: subprocess stdio and HTTP + SSE.
//!
//! Handles low-level communication with one MCP server:
//! - Stdio: line-delimited JSON over a child process's stdin/stdout
//! - SSE: requests POSTed to an announced endpoint, responses pushed back
//!   as `message` events on a long-lived event stream
//!
//! Both expose the same `request` / `notify` / `close` surface through
//! [`Transport`].

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::config::{ServerSpec, TransportSpec};
use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse::SseDecoder;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for graceful exit after stdin is closed, before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Maximum length of the stderr excerpt attached to errors.
const STDERR_EXCERPT_CHARS: usize = 2000;

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// An open channel to one tool server.
pub enum Transport {
    Stdio(StdioTransport),
    Sse(SseTransport),
}

impl Transport {
    /// Open the transport described by `spec`.
    pub async fn open(spec: &ServerSpec, http: &reqwest::Client) -> Result<Self, McpError> {
        match &spec.transport {
            TransportSpec::Subprocess { command, args, env } => {
                tracing::info!(
                    server = %spec.name,
                    command = %command,
                    args = ?args,
                    "launching local server"
                );
                StdioTransport::spawn(&spec.name, command, args, env).map(Transport::Stdio)
            }
            TransportSpec::Streamed { url } => {
                tracing::info!(server = %spec.name, url = %url, "connecting remote server");
                SseTransport::connect(&spec.name, url, http.clone())
                    .await
                    .map(Transport::Sse)
            }
        }
    }

    /// Send a request and wait for the matching response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        match self {
            Transport::Stdio(t) => t.request(method, params).await,
            Transport::Sse(t) => t.request(method, params).await,
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        match self {
            Transport::Stdio(t) => t.notify(method, params).await,
            Transport::Sse(t) => t.notify(method, params).await,
        }
    }

    /// Tear down the channel.
    pub async fn close(&self) -> Result<(), McpError> {
        match self {
            Transport::Stdio(t) => t.close().await,
            Transport::Sse(t) => {
                t.close();
                Ok(())
            }
        }
    }

    /// Recent diagnostic output (stderr tail for subprocesses).
    pub fn diagnostics(&self) -> String {
        match self {
            Transport::Stdio(t) => t.stderr_excerpt(),
            Transport::Sse(_) => String::new(),
        }
    }
}

// ─── Stdio ───────────────────────────────────────────────────────────────────

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    server_name: String,
    /// `None` once closed.
    writer: Mutex<Option<ChildStdin>>,
    /// Held for a whole request/response exchange.
    reader: Mutex<BufReader<ChildStdout>>,
    process: Mutex<Child>,
    stderr_tail: Arc<std::sync::Mutex<VecDeque<String>>>,
    /// Set when a write was abandoned part way. Stdin framing is then
    /// unknown, so every later exchange fails.
    poisoned: Arc<AtomicBool>,
}

/// Poisons the transport unless disarmed before drop.
struct WriteGuard {
    poisoned: Arc<AtomicBool>,
    done: bool,
}

impl WriteGuard {
    fn new(poisoned: &Arc<AtomicBool>) -> Self {
        Self {
            poisoned: poisoned.clone(),
            done: false,
        }
    }

    fn finish(mut self) {
        self.done = true;
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if !self.done {
            self.poisoned.store(true, Ordering::SeqCst);
        }
    }
}

impl StdioTransport {
    /// Spawn the server process and wire its stdio.
    pub fn spawn(
        server_name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (key, value) in env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: format!("{e}"),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdin".into(),
        })?;

        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdout".into(),
        })?;

        let stderr_tail = Arc::new(std::sync::Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_drain(server_name.to_string(), stderr, stderr_tail.clone());
        }

        Ok(Self {
            server_name: server_name.to_string(),
            writer: Mutex::new(Some(stdin)),
            reader: Mutex::new(BufReader::new(stdout)),
            process: Mutex::new(child),
            stderr_tail,
            poisoned: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Send a JSON-RPC request and wait for the matching response.
    ///
    /// Write one line of JSON, then read lines until one parses as a response
    /// with the same `id`. Non-JSON lines (server log output) are skipped.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = next_request_id();
        let req = JsonRpcRequest::new(id, method, params);
        let line = self.encode(&req)?;

        // Lock the reader first so exchanges never interleave.
        let mut reader = self.reader.lock().await;
        self.write_line(&line).await?;

        let mut line_buf = String::new();
        loop {
            line_buf.clear();
            let bytes_read = reader
                .read_line(&mut line_buf)
                .await
                .map_err(|e| self.transport_error(format!("failed to read from stdout: {e}")))?;

            if bytes_read == 0 {
                return Err(self.transport_error(format!(
                    "server stdout closed (process may have exited){}",
                    format_stderr_suffix(&self.stderr_excerpt())
                )));
            }

            let trimmed = line_buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) if resp.id == id => return Ok(resp),
                Ok(resp) => {
                    tracing::debug!(
                        server = %self.server_name,
                        expected = id,
                        got = resp.id,
                        "skipping response for another request"
                    );
                }
                Err(_) => {
                    tracing::trace!(server = %self.server_name, line = %trimmed, "non-response line");
                }
            }
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let line = self.encode(&JsonRpcNotification::new(method, params))?;
        self.write_line(&line).await
    }

    /// Close stdin, give the process a moment to exit, then kill it.
    pub async fn close(&self) -> Result<(), McpError> {
        // Dropping stdin signals EOF to well-behaved servers.
        self.writer.lock().await.take();

        let mut process = self.process.lock().await;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server_name, %status, "server exited");
                Ok(())
            }
            _ => process
                .kill()
                .await
                .map_err(|e| self.transport_error(format!("failed to kill process: {e}"))),
        }
    }

    /// The captured stderr tail, truncated for log readability.
    pub fn stderr_excerpt(&self) -> String {
        let Ok(tail) = self.stderr_tail.lock() else {
            return String::new();
        };
        let mut joined = tail.iter().cloned().collect::<Vec<_>>().join("\n");
        if joined.len() > STDERR_EXCERPT_CHARS {
            let mut cut = STDERR_EXCERPT_CHARS;
            while !joined.is_char_boundary(cut) {
                cut -= 1;
            }
            joined.truncate(cut);
            joined.push_str("...(truncated)");
        }
        joined
    }

    fn encode<T: serde::Serialize>(&self, message: &T) -> Result<String, McpError> {
        let mut json = serde_json::to_string(message)
            .map_err(|e| self.transport_error(format!("failed to serialize message: {e}")))?;
        json.push('\n');
        Ok(json)
    }

    /// Write one framed line.
    ///
    /// A half-written line would corrupt every later message, so a write
    /// cancelled part way (e.g. by a caller's timeout) poisons the transport.
    /// Reads need no such care: a truncated reply line fails to parse and is
    /// skipped, and late replies are matched by id.
    async fn write_line(&self, line: &str) -> Result<(), McpError> {
        let mut slot = self.writer.lock().await;
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(self.transport_error(
                "an earlier write was interrupted, stream state unknown".to_string(),
            ));
        }
        let writer = slot
            .as_mut()
            .ok_or_else(|| self.transport_error("transport closed".to_string()))?;

        let guard = WriteGuard::new(&self.poisoned);
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error(format!("failed to write to stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(format!("failed to flush stdin: {e}")))?;
        guard.finish();
        Ok(())
    }

    fn transport_error(&self, reason: String) -> McpError {
        McpError::TransportError {
            server: self.server_name.clone(),
            reason,
        }
    }
}

/// Continuously drain a child's stderr.
///
/// A child that logs heavily would otherwise block once the pipe buffer
/// fills, stalling its stdout replies as well.
fn spawn_stderr_drain(
    server_name: String,
    stderr: tokio::process::ChildStderr,
    tail: Arc<std::sync::Mutex<VecDeque<String>>>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server_name, stderr = %line, "server stderr");
            if let Ok(mut tail) = tail.lock() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    });
}

/// Format a stderr suffix for error messages (empty string if no stderr).
pub fn format_stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

// ─── SSE ─────────────────────────────────────────────────────────────────────

/// Requests awaiting a response, and whether the event stream can still
/// deliver one.
#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once the reader task stops or the transport is closed.
    closed: bool,
}

impl Pending {
    fn shut(&mut self) {
        self.closed = true;
        // Dropping the senders wakes every waiter with an error.
        self.waiters.clear();
    }
}

type PendingMap = Arc<std::sync::Mutex<Pending>>;

/// JSON-RPC over the MCP HTTP + SSE binding.
///
/// `GET url` opens the event stream; its first `endpoint` event names the URL
/// that requests are POSTed to. Responses come back as `message` events.
pub struct SseTransport {
    server_name: String,
    http: reqwest::Client,
    endpoint: reqwest::Url,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the endpoint announcement.
    pub async fn connect(
        server_name: &str,
        url: &str,
        http: reqwest::Client,
    ) -> Result<Self, McpError> {
        let spawn_failed = |reason: String| McpError::SpawnFailed {
            name: server_name.to_string(),
            reason,
        };

        let base = reqwest::Url::parse(url).map_err(|e| spawn_failed(format!("invalid url: {e}")))?;

        let response = http
            .get(base.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| spawn_failed(format!("failed to open event stream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(spawn_failed(format!("event stream returned HTTP {status}")));
        }

        let pending: PendingMap = Arc::new(std::sync::Mutex::new(Pending::default()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(read_event_stream(
            server_name.to_string(),
            base,
            response,
            pending.clone(),
            endpoint_tx,
        ));

        let endpoint = match endpoint_rx.await {
            Ok(endpoint) => endpoint,
            Err(_) => {
                reader.abort();
                return Err(spawn_failed(
                    "event stream ended before announcing an endpoint".into(),
                ));
            }
        };

        tracing::debug!(server = %server_name, endpoint = %endpoint, "remote endpoint announced");

        Ok(Self {
            server_name: server_name.to_string(),
            http,
            endpoint,
            pending,
            reader,
        })
    }

    /// POST a request and wait for its response on the event stream.
    ///
    /// Fails immediately once the event stream has ended, since no response
    /// could ever arrive.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = next_request_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_state()?;
            if pending.closed {
                return Err(self.stream_closed());
            }
            pending.waiters.insert(id, tx);
        }

        if let Err(e) = self.post(&JsonRpcRequest::new(id, method, params)).await {
            if let Ok(mut pending) = self.pending.lock() {
                pending.waiters.remove(&id);
            }
            return Err(e);
        }

        rx.await.map_err(|_| self.stream_closed())
    }

    /// POST a notification.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let closed = self.pending_state()?.closed;
        if closed {
            return Err(self.stream_closed());
        }
        self.post(&JsonRpcNotification::new(method, params)).await
    }

    /// Stop reading the event stream and fail every pending request.
    pub fn close(&self) {
        self.reader.abort();
        if let Ok(mut pending) = self.pending.lock() {
            pending.shut();
        }
    }

    fn stream_closed(&self) -> McpError {
        McpError::TransportError {
            server: self.server_name.clone(),
            reason: "event stream closed, no response can arrive".into(),
        }
    }

    async fn post<T: serde::Serialize>(&self, message: &T) -> Result<(), McpError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| McpError::TransportError {
                server: self.server_name.clone(),
                reason: format!("failed to post message: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::TransportError {
                server: self.server_name.clone(),
                reason: format!("endpoint returned HTTP {status}: {body}"),
            });
        }
        Ok(())
    }

    fn pending_state(&self) -> Result<std::sync::MutexGuard<'_, Pending>, McpError> {
        self.pending.lock().map_err(|e| McpError::TransportError {
            server: self.server_name.clone(),
            reason: format!("lock poisoned: {e}"),
        })
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reader task: decode the event stream, announce the endpoint, route responses.
async fn read_event_stream(
    server_name: String,
    base: reqwest::Url,
    response: reqwest::Response,
    pending: PendingMap,
    endpoint_tx: oneshot::Sender<reqwest::Url>,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut decoder = SseDecoder::new();
    let mut bytes = response.bytes_stream();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(server = %server_name, error = %e, "event stream read error");
                break;
            }
        };
        decoder.push(&chunk);

        while let Some(event) = decoder.next_event() {
            match event.kind() {
                "endpoint" => match base.join(event.data.trim()) {
                    Ok(endpoint) => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(endpoint);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(server = %server_name, error = %e, "invalid endpoint event");
                    }
                },
                "message" => match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                    Ok(resp) => {
                        let waiter = pending
                            .lock()
                            .ok()
                            .and_then(|mut p| p.waiters.remove(&resp.id));
                        match waiter {
                            Some(tx) => {
                                let _ = tx.send(resp);
                            }
                            None => tracing::debug!(
                                server = %server_name,
                                id = resp.id,
                                "response with no pending request"
                            ),
                        }
                    }
                    Err(_) => {
                        tracing::trace!(server = %server_name, data = %event.data, "non-response message");
                    }
                },
                other => {
                    tracing::trace!(server = %server_name, kind = %other, "ignoring event");
                }
            }
        }
    }

    tracing::debug!(server = %server_name, "event stream ended");
    match pending.lock() {
        Ok(mut pending) => pending.shut(),
        Err(poisoned) => poisoned.into_inner().shut(),
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: super::types::error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_request_id_is_monotonic() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_extract_result_success() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: 1,
            result: Some(serde_json::json!({"text": "hello"})),
            error: None,
        };
        let result = extract_result(resp).unwrap();
        assert_eq!(result["text"], "hello");
    }

    #[test]
    fn test_extract_result_error() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: 1,
            result: None,
            error: Some(super::super::types::JsonRpcError {
                code: -32601,
                message: "Method not found".into(),
                data: None,
            }),
        };
        match extract_result(resp).unwrap_err() {
            McpError::ServerError { code, message, .. } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_result_missing_both() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: 1,
            result: None,
            error: None,
        };
        let err = extract_result(resp).unwrap_err();
        assert!(matches!(err, McpError::ServerError { .. }));
    }

    #[test]
    fn test_format_stderr_suffix() {
        assert_eq!(format_stderr_suffix(""), "");
        assert_eq!(format_stderr_suffix("boom\n"), " | stderr: boom");
    }

    #[tokio::test]
    async fn test_spawn_missing_command_fails() {
        let result = StdioTransport::spawn(
            "ghost",
            "definitely-not-a-real-command-4f9a",
            &[],
            &HashMap::new(),
        );
        assert!(matches!(result, Err(McpError::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupted_write_poisons_stdio() {
        // Never reads stdin, so a write larger than the pipe buffer blocks.
        let transport = StdioTransport::spawn(
            "deaf",
            "sh",
            &["-c".to_string(), "sleep 30".to_string()],
            &HashMap::new(),
        )
        .unwrap();

        let bulky = serde_json::json!({ "blob": "x".repeat(1 << 20) });
        let first = tokio::time::timeout(
            Duration::from_millis(200),
            transport.request("initialize", Some(bulky)),
        )
        .await;
        assert!(first.is_err(), "request should have timed out");
        assert!(transport.poisoned.load(Ordering::SeqCst));

        let second = tokio::time::timeout(
            Duration::from_secs(2),
            transport.request("tools/list", None),
        )
        .await
        .expect("poisoned transport must fail fast");
        match second {
            Err(McpError::TransportError { reason, .. }) => assert!(reason.contains("interrupted")),
            other => panic!("expected TransportError, got {other:?}"),
        }
        assert!(transport.notify("notifications/initialized", None).await.is_err());
        // kill_on_drop reaps the sleeper.
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_read_keeps_stdio_usable() {
        // Reads requests but never answers.
        let transport = StdioTransport::spawn(
            "mute",
            "sh",
            &["-c".to_string(), "cat > /dev/null".to_string()],
            &HashMap::new(),
        )
        .unwrap();

        let first = tokio::time::timeout(
            Duration::from_millis(200),
            transport.request("initialize", None),
        )
        .await;
        assert!(first.is_err(), "request should have timed out");

        transport.notify("notifications/initialized", None).await.unwrap();
        assert!(!transport.poisoned.load(Ordering::SeqCst));
        transport.notify("notifications/initialized", None).await.unwrap();

        transport.close().await.unwrap();
    }

    // ── In-process HTTP + SSE server ──

    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Read one HTTP request: head as text, body by `Content-Length`.
    async fn read_http_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        let mut body = buf[head_end..].to_vec();
        while body.len() < length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        (head, body)
    }

    /// Serve `GET /sse` (announcing `/messages`) and `POST /messages`.
    ///
    /// With `keep_open`, each POSTed request is answered on the event stream
    /// with its method echoed back; otherwise the stream ends right after the
    /// endpoint announcement.
    async fn serve_sse(keep_open: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<String>();
        let reply_rx = Arc::new(Mutex::new(Some(reply_rx)));

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let reply_tx = reply_tx.clone();
                let reply_rx = reply_rx.clone();
                tokio::spawn(async move {
                    let (head, body) = read_http_request(&mut stream).await;
                    if head.starts_with("GET") {
                        stream
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
                                  event: endpoint\ndata: /messages\n\n",
                            )
                            .await
                            .unwrap();
                        if !keep_open {
                            return;
                        }
                        let Some(mut replies) = reply_rx.lock().await.take() else {
                            return;
                        };
                        while let Some(frame) = replies.recv().await {
                            if stream.write_all(frame.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    } else {
                        let _ = stream
                            .write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                            .await;
                        let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
                        if let Some(id) = request.get("id") {
                            let reply = serde_json::json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": {"method": request["method"]},
                            });
                            let _ = reply_tx.send(format!("event: message\ndata: {reply}\n\n"));
                        }
                    }
                });
            }
        });

        format!("http://{addr}/sse")
    }

    #[tokio::test]
    async fn test_sse_request_is_answered_on_event_stream() {
        let url = serve_sse(true).await;
        let transport = SseTransport::connect("remote", &url, reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(transport.endpoint.path(), "/messages");

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            transport.request("tools/list", None),
        )
        .await
        .expect("request should complete")
        .unwrap();
        assert_eq!(extract_result(response).unwrap()["method"], "tools/list");

        transport.notify("notifications/initialized", None).await.unwrap();

        transport.close();
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::TransportError { .. }));
    }

    #[tokio::test]
    async fn test_sse_request_fails_fast_after_stream_ends() {
        let url = serve_sse(false).await;
        let transport = SseTransport::connect("remote", &url, reqwest::Client::new())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !transport.reader.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("reader should stop when the stream ends");

        let result =
            tokio::time::timeout(Duration::from_secs(3), transport.request("tools/list", None))
                .await
                .expect("request must not wait on a dead stream");
        match result {
            Err(McpError::TransportError { reason, .. }) => assert!(reason.contains("closed")),
            other => panic!("expected TransportError, got {other:?}"),
        }

        let notify = transport.notify("notifications/initialized", None).await;
        assert!(matches!(notify, Err(McpError::TransportError { .. })));
    }

    #[tokio::test]
    async fn test_sse_connect_refused_fails() {
        // Port 9 (discard) is essentially never listening for HTTP.
        let result =
            SseTransport::connect("remote", "http://127.0.0.1:9/sse", reqwest::Client::new()).await;
        assert!(matches!(result, Err(McpError::SpawnFailed { .. })));
    }
}
