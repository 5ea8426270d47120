//! Line framing and event decoding for chat-completion SSE streams.

use chorus_rs_protocol::LlmError;
use serde::Deserialize;

/// Splits a byte stream into complete lines.
///
/// Bytes are held until a newline arrives, so multi-byte characters split
/// across network chunks are decoded intact.
#[derive(Debug, Default)]
pub(super) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(super) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the stream closes.
    pub(super) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// One decoded SSE line.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

pub(super) fn parse_line(line: &str) -> Result<SseEvent, LlmError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|err| LlmError::Decode(format!("stream chunk: {err}")))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::Provider(error.message));
    }
    let delta: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    if delta.is_empty() {
        Ok(SseEvent::Skip)
    } else {
        Ok(SseEvent::Delta(delta))
    }
}
