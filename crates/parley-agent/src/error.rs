//! Error types for parley-agent

use thiserror::Error;

use crate::events::ErrorKind;

/// Result type alias using parley-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the chat exchange layer
    #[error(transparent)]
    Ai(#[from] parley_ai::Error),

    /// An error from capture or synthesis
    #[error(transparent)]
    Voice(#[from] parley_voice::Error),

    /// The conversation has been torn down
    #[error("Conversation is closed")]
    Closed,

    /// A request was not valid in the current phase
    #[error("{0}")]
    Rejected(String),
}

impl Error {
    /// Classification reported to observers, if this error is surfaced at all
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Ai(_) => Some(ErrorKind::ChatTransport),
            Error::Voice(e) if e.is_unsupported() => Some(ErrorKind::Unsupported),
            Error::Voice(parley_voice::Error::Synthesis(_)) => Some(ErrorKind::SynthesisFailure),
            Error::Voice(_) => Some(ErrorKind::Capture),
            Error::Closed | Error::Rejected(_) => None,
        }
    }
}
