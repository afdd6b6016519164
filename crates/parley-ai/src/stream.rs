//! Streaming event types and transcript accumulation

use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while an exchange streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Text fragment to append to the reply
    Delta { text: String },
    /// Reply completed; nothing follows
    Done,
    /// Exchange failed mid-stream; nothing follows
    Error { message: String },
}

impl ChatEvent {
    /// Create a delta event
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }

    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error { .. })
    }
}

/// A stream of chat events
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Owns the reply buffer for one turn.
///
/// Deltas are appended in arrival order; the buffer is handed off by value
/// once the terminator has been seen.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    buffer: String,
    deltas: usize,
    complete: bool,
}

impl TranscriptAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event. Returns `true` if the buffer grew.
    pub fn process_event(&mut self, event: &ChatEvent) -> bool {
        if self.complete {
            return false;
        }
        match event {
            ChatEvent::Delta { text } => {
                self.buffer.push_str(text);
                self.deltas += 1;
                true
            }
            ChatEvent::Done => {
                self.complete = true;
                false
            }
            ChatEvent::Error { .. } => false,
        }
    }

    /// Mark the buffer complete without a terminator event
    pub fn complete(&mut self) {
        self.complete = true;
    }

    /// Current accumulated text
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Whether the terminator has been seen
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of deltas applied so far
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Take the terminal value as an assistant message
    pub fn into_message(self) -> Message {
        Message::assistant(self.buffer)
    }
}
