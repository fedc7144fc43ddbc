//! Server-sent event parsing for the AI chat stream.
//!
//! The chat endpoint answers with `data: {json}` lines. Each JSON object has a
//! `type` tag (`token`, `status`, `action`, `error`, `done`). The stream ends
//! with a `done` event or the literal `data: [DONE]` line.

use serde::Deserialize;

/// One decoded chat stream event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    Token { token: String, full_text: String },
    Status {
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
    Action { action: serde_json::Value },
    Error {
        error: String,
        #[serde(default)]
        code: Option<String>,
    },
    Done {
        #[serde(default)]
        summary: Option<String>,
    },
}

const DONE_SENTINEL: &str = "[DONE]";

/// Parse one SSE line into an event.
///
/// Returns `None` for blank lines, comments, non-data fields, and malformed
/// JSON. Never panics on input.
pub fn parse_sse_event(line: &str) -> Option<ChatEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();

    if data == DONE_SENTINEL {
        return Some(ChatEvent::Done { summary: None });
    }
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, line = data, "dropping malformed SSE line");
            None
        }
    }
}

/// Splits a byte stream into complete lines.
///
/// Bytes are buffered until a newline arrives so multi-byte characters split
/// across chunks decode correctly. Call [`SseLineBuffer::finish`] after the
/// stream ends to get the trailing partial line.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Receives chat stream progress.
///
/// Exactly one of `on_done` or `on_error` is called per stream, including
/// when the stream is cancelled or times out.
pub trait ChatStreamHandler {
    fn on_token(&mut self, _token: &str, _full_text: &str) {}
    fn on_status(&mut self, _status: &str, _message: Option<&str>) {}
    fn on_action(&mut self, _action: &serde_json::Value) {}
    fn on_done(&mut self, summary: Option<String>);
    fn on_error(&mut self, error: ChatStreamError);
}

/// Why a chat stream ended without a `done` event.
#[derive(Debug, Clone, PartialEq, thiserror::Error, miette::Diagnostic)]
pub enum ChatStreamError {
    #[error("chat stream cancelled")]
    #[diagnostic(code(chat::cancelled))]
    Cancelled,

    #[error("chat stream timed out")]
    #[diagnostic(code(chat::timeout))]
    Timeout,

    #[error("chat request failed: {0}")]
    #[diagnostic(code(chat::request))]
    Request(String),

    #[error("assistant error: {error}")]
    #[diagnostic(code(chat::remote))]
    Remote { error: String, code: Option<String> },
}
