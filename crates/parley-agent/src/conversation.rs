//! Conversation state and the published snapshot.

use parley_ai::Message;
use parley_voice::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Message count at which history collection reads as complete
const HISTORY_TARGET_MESSAGES: usize = 20;

/// Turn-taking phase. Mute is a separate flag, not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Listening,
    /// Turn submitted, reply streaming
    Thinking,
    /// Reply complete, utterance pending or playing
    Speaking,
    /// Torn down
    Closed,
}

impl Phase {
    /// Whether a new turn may be submitted
    pub fn accepts_submission(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Listening)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Listening => "listening",
            Phase::Thinking => "thinking",
            Phase::Speaking => "speaking",
            Phase::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable conversation state, owned by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub phase: Phase,
    /// Locale bound at capture start and at each utterance
    pub language: Language,
    pub muted: bool,
    /// Re-arm capture after each spoken reply
    pub continuous: bool,
    /// Interim capture text, display only
    pub pending_transcript: String,
}

/// Read-only view of a conversation.
///
/// `version` strictly increases with every publish.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub version: u64,
    pub conversation_id: Uuid,
    pub state: ConversationState,
    pub messages: Vec<Message>,
    /// Reply text received so far while `Thinking`
    pub streaming: Option<String>,
    pub capture_supported: bool,
    pub synthesis_supported: bool,
    /// Percent of history collected, for history-taking conversations
    pub progress: Option<u8>,
}

impl Snapshot {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// History collection progress for a conversation of `messages` messages
pub fn history_progress(messages: usize) -> u8 {
    (messages.min(HISTORY_TARGET_MESSAGES) * 100 / HISTORY_TARGET_MESSAGES) as u8
}
