//! Speech synthesis with fallback

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    language::Language,
};

/// A text-to-speech path
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn is_supported(&self) -> bool;

    /// Speak `text` to completion, or return early once `cancel` fires.
    async fn synthesize(&self, text: &str, language: Language, cancel: CancellationToken)
    -> Result<()>;
}

/// How an utterance finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpeakOutcome {
    Completed,
    Cancelled,
    Failed { message: String },
}

impl SpeakOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SpeakOutcome::Completed)
    }
}

#[derive(Default)]
struct Utterance {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Speaks one utterance at a time.
///
/// A new `speak` cancels whatever is still playing. Cloning shares the
/// current utterance, so any clone can cancel it.
#[derive(Clone)]
pub struct SynthesisController {
    primary: Arc<dyn SpeechEngine>,
    fallback: Option<Arc<dyn SpeechEngine>>,
    current: Arc<Mutex<Utterance>>,
}

impl SynthesisController {
    pub fn new(primary: Arc<dyn SpeechEngine>) -> Self {
        Self {
            primary,
            fallback: None,
            current: Arc::new(Mutex::new(Utterance::default())),
        }
    }

    /// Engine tried once when the primary path fails
    pub fn with_fallback(mut self, fallback: Arc<dyn SpeechEngine>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// True if any path can speak
    pub fn is_supported(&self) -> bool {
        self.primary.is_supported()
            || self
                .fallback
                .as_ref()
                .is_some_and(|engine| engine.is_supported())
    }

    pub fn is_speaking(&self) -> bool {
        self.current.lock().cancel.is_some()
    }

    /// Stop the current utterance, if any. Its `speak` resolves as cancelled.
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().cancel.take() {
            tracing::debug!("Cancelling utterance");
            token.cancel();
        }
    }

    /// Speak `text`, resolving once playback completes, fails or is cancelled
    pub async fn speak(&self, text: &str, language: Language) -> SpeakOutcome {
        let (generation, cancel) = self.begin();
        let outcome = self.run(text, language, &cancel).await;
        self.end(generation);
        tracing::debug!("Utterance finished: {:?}", outcome);
        outcome
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut current = self.current.lock();
        if let Some(previous) = current.cancel.take() {
            tracing::debug!("New utterance replaces one still playing");
            previous.cancel();
        }
        current.generation += 1;
        let token = CancellationToken::new();
        current.cancel = Some(token.clone());
        (current.generation, token)
    }

    fn end(&self, generation: u64) {
        let mut current = self.current.lock();
        if current.generation == generation {
            current.cancel = None;
        }
    }

    async fn run(&self, text: &str, language: Language, cancel: &CancellationToken) -> SpeakOutcome {
        let primary_error = match attempt(self.primary.as_ref(), text, language, cancel).await {
            Ok(()) => return settled(cancel),
            Err(_) if cancel.is_cancelled() => return SpeakOutcome::Cancelled,
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            tracing::warn!("Synthesis via {} failed: {}", self.primary.name(), primary_error);
            return SpeakOutcome::Failed {
                message: primary_error.to_string(),
            };
        };

        tracing::warn!(
            "Synthesis via {} failed, retrying with {}: {}",
            self.primary.name(),
            fallback.name(),
            primary_error
        );

        match attempt(fallback.as_ref(), text, language, cancel).await {
            Ok(()) => settled(cancel),
            Err(_) if cancel.is_cancelled() => SpeakOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Fallback synthesis via {} failed: {}", fallback.name(), e);
                SpeakOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

fn settled(cancel: &CancellationToken) -> SpeakOutcome {
    if cancel.is_cancelled() {
        SpeakOutcome::Cancelled
    } else {
        SpeakOutcome::Completed
    }
}

async fn attempt(
    engine: &dyn SpeechEngine,
    text: &str,
    language: Language,
    cancel: &CancellationToken,
) -> Result<()> {
    if !engine.is_supported() {
        return Err(Error::synthesis_unsupported());
    }
    // Cancellation resolves the utterance even if the engine keeps going.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(()),
        result = engine.synthesize(text, language, cancel.clone()) => result,
    }
}
