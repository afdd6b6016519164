//! Error types for parley-voice

use thiserror::Error;

/// Result type alias using parley-voice Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by capture and synthesis
#[derive(Error, Debug)]
pub enum Error {
    /// The platform lacks the capability
    #[error("{capability} is not supported on this platform")]
    Unsupported { capability: &'static str },

    /// A synthesis path failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Speech capture failed
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Locale tag outside the supported set
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    /// Spawning or talking to a platform process failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn capture_unsupported() -> Self {
        Self::Unsupported {
            capability: "Speech capture",
        }
    }

    pub fn synthesis_unsupported() -> Self {
        Self::Unsupported {
            capability: "Speech synthesis",
        }
    }

    /// Check if this error reports a missing capability
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}
