//! Conversation event types

use parley_ai::Message;
use parley_voice::SpeakOutcome;
use serde::{Deserialize, Serialize};

use crate::conversation::Phase;

/// Failure classes surfaced to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Capture or synthesis is missing on this platform
    Unsupported,
    /// The chat exchange failed before or during streaming
    ChatTransport,
    /// Both synthesis paths failed; the reply stays text-only
    SynthesisFailure,
    /// Capture could not be started
    Capture,
}

/// Events emitted while a conversation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// Phase transition
    PhaseChanged { from: Phase, to: Phase },

    /// Captured speech, interim or final
    TranscriptUpdated { text: String, is_final: bool },

    /// A user message was submitted and an exchange opened
    TurnStart { turn_number: u32 },

    /// Reply text grew; `text` is everything received so far
    MessageUpdate { delta: String, text: String },

    /// A message was appended to history
    MessageEnd { message: Message },

    /// An utterance is about to play
    SpeechStart { text: String },

    /// The utterance finished
    SpeechEnd { outcome: SpeakOutcome },

    /// A request was ignored in the current phase
    Rejected { reason: String },

    /// Error occurred
    Error { kind: ErrorKind, message: String },

    /// Teardown finished; nothing follows
    Closed,
}

impl ConversationEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationEvent::Closed)
    }
}
