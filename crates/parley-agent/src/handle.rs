//! A cloneable handle for driving a conversation from external code.

use parley_voice::Language;
use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    conversation::{Phase, Snapshot},
    error::{Error, Result},
    events::ConversationEvent,
};

/// Requests handled by the orchestrator loop, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    StartListening,
    StopListening,
    ToggleListening,
    Submit(String),
    SetMuted(bool),
    ToggleMute,
    SetLanguage(Language),
    SetContinuous(bool),
    Close,
}

/// A cloneable handle for driving a conversation.
///
/// Dropping every handle tears the conversation down.
#[derive(Clone)]
pub struct ConversationHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        snapshot: watch::Receiver<Snapshot>,
        events: broadcast::Sender<ConversationEvent>,
    ) -> Self {
        Self {
            commands,
            snapshot,
            events,
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Closed)
    }

    /// Begin capture. Only honoured while idle.
    pub fn start_listening(&self) -> Result<()> {
        self.send(Command::StartListening)
    }

    pub fn stop_listening(&self) -> Result<()> {
        self.send(Command::StopListening)
    }

    pub fn toggle_listening(&self) -> Result<()> {
        self.send(Command::ToggleListening)
    }

    /// Submit typed input as a new turn
    pub fn submit(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::Submit(text.into()))
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(Command::SetMuted(muted))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.send(Command::ToggleMute)
    }

    /// Switch locale. Only honoured while idle.
    pub fn set_language(&self, language: Language) -> Result<()> {
        self.send(Command::SetLanguage(language))
    }

    pub fn set_continuous(&self, continuous: bool) -> Result<()> {
        self.send(Command::SetContinuous(continuous))
    }

    /// Tear the conversation down. Safe to call more than once.
    pub fn close(&self) {
        if self.commands.send(Command::Close).is_err() {
            tracing::debug!("Conversation already closed");
        }
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Wait until teardown has finished
    pub async fn closed(&self) {
        let mut snapshot = self.snapshot.clone();
        // An error means the orchestrator is gone, which is closed as well.
        let _ = snapshot.wait_for(|s| s.phase() == Phase::Closed).await;
    }
}
