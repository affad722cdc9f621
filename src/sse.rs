//! Server-Sent Events framing.
//!
//! Shared by the three places that speak SSE:
//! - the model endpoint's streamed replies (decode)
//! - the MCP HTTP+SSE transport (decode)
//! - the caller-facing relay stream (encode)
//!
//! Events are separated by a blank line. Within an event, `event:` names the
//! kind and one or more `data:` lines carry the payload (joined with `\n`).
//! Lines starting with `:` are comments (keep-alives).

// ─── Event ───────────────────────────────────────────────────────────────────

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present. Absent means the default `message` kind.
    pub event: Option<String>,
    /// The joined `data:` lines.
    pub data: String,
}

impl SseEvent {
    /// The event kind, defaulting to `message` as the SSE spec does.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Incremental SSE decoder.
///
/// Bytes arrive in arbitrary chunks, possibly splitting a UTF-8 character.
/// `push` buffers raw bytes and `next_event` decodes only complete event
/// blocks, which always end on a line boundary.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// A `\r` ended the previous chunk; its line ending is not yet known.
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of bytes from the wire.
    ///
    /// `\r\n` and lone `\r` line endings are normalized to `\n`.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.reserve(bytes.len());
        for &byte in bytes {
            if std::mem::take(&mut self.pending_cr) {
                self.buffer.push(b'\n');
                if byte == b'\n' {
                    continue;
                }
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(byte);
            }
        }
    }

    /// Pop the next complete event, skipping comment-only blocks.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let block = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
            self.buffer.drain(..end + 2);

            if let Some(event) = parse_block(&block) {
                return Some(event);
            }
        }
    }

    /// Drain whatever is left once the underlying stream has ended.
    ///
    /// Some servers close the connection without the trailing blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if std::mem::take(&mut self.pending_cr) {
            self.buffer.push(b'\n');
        }
        if let Some(event) = self.next_event() {
            return Some(event);
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        if rest.trim().is_empty() {
            return None;
        }
        parse_block(rest.trim_end())
    }
}

/// Parse one event block. Returns `None` for comment/keep-alive blocks.
fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {} // id, retry: not used here
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Encode one event as a wire frame: `event: <kind>\ndata: <data>\n\n`.
///
/// Multi-line data is split over several `data:` lines so the frame stays
/// decodable.
pub fn encode_frame(kind: &str, data: &str) -> String {
    let mut frame = format!("event: {kind}\n");
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

// ─── Tests ───────────────────────────────────────────────────────────────────
