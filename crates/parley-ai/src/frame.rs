//! Line framing for the streamed chat body.
//!
//! The body is a sequence of `data: <payload>` lines. A payload is either a
//! JSON object carrying a `text` fragment or the literal `[DONE]` sentinel.
//! Transport chunks do not respect line boundaries, so bytes are buffered
//! until a full line is available; decoding happens per line, which keeps
//! multi-byte characters split across chunks intact.

use serde::Deserialize;

/// The sentinel payload ending a stream
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text fragment to append
    Delta(String),
    /// End of stream; no further deltas follow
    Done,
    /// Payload that failed to parse (carries the raw payload)
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    text: Option<String>,
}

/// Incremental decoder turning byte chunks into frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every frame completed by it.
    ///
    /// An incomplete trailing line is kept and prefixed onto the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(frame) = decode_line(&self.pending[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        frames
    }

    /// Flush the final line of a body that did not end with a newline.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

/// Decode a single line. Returns `None` for lines that carry nothing.
pub fn decode_line(line: &[u8]) -> Option<Frame> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');

    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<FramePayload>(payload) {
        Ok(FramePayload { text: Some(text) }) if !text.is_empty() => Some(Frame::Delta(text)),
        Ok(_) => None,
        Err(_) => Some(Frame::Malformed(payload.to_string())),
    }
}
