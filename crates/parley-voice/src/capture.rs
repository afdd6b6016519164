//! Continuous speech capture

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    language::Language,
};

/// A transcript update from the recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Best guess so far (interim) or the settled utterance (final)
    pub text: String,
    /// End of utterance detected
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// A stream of transcript events; dropping it ends listening
pub type TranscriptStream = Pin<Box<dyn Stream<Item = TranscriptEvent> + Send>>;

/// Platform speech-to-text capability
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether capture is available at all
    fn is_supported(&self) -> bool;

    /// Begin continuous listening in the given locale
    async fn listen(&self, language: Language) -> Result<TranscriptStream>;
}

struct ActiveCapture {
    language: Language,
    events: TranscriptStream,
}

/// Owns the single capture session of a conversation
pub struct CaptureController {
    recognizer: Arc<dyn SpeechRecognizer>,
    active: Option<ActiveCapture>,
}

impl CaptureController {
    /// Create a controller over a platform recognizer
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            active: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    /// Start listening. A no-op if already listening.
    pub async fn start(&mut self, language: Language) -> Result<()> {
        if let Some(active) = &self.active {
            tracing::debug!("Capture already running ({}), ignoring start", active.language);
            return Ok(());
        }
        if !self.recognizer.is_supported() {
            return Err(Error::capture_unsupported());
        }

        let events = self.recognizer.listen(language).await?;
        self.active = Some(ActiveCapture {
            language,
            events,
        });
        tracing::debug!("Capture started ({})", language);
        Ok(())
    }

    /// Stop listening. Returns `false` if capture was not running.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                tracing::debug!("Capture stopped ({})", active.language);
                true
            }
            None => false,
        }
    }

    /// Wait for the next transcript event.
    ///
    /// Pending forever while idle. Returns `None` when the platform ended the
    /// session on its own; the controller is idle afterwards.
    pub async fn next_event(&mut self) -> Option<TranscriptEvent> {
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        let event = active.events.next().await;
        if event.is_none() {
            tracing::debug!("Capture ended by the platform");
            self.active = None;
        }
        event
    }
}
