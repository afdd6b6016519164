//! Orchestrator configuration

use parley_ai::ConversationType;
use parley_voice::Language;
use std::collections::HashMap;
use std::time::Duration;

use crate::greetings;

/// Shown as the assistant reply when an exchange fails
pub const DEFAULT_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Quiet intervals around the capture/synthesis handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    /// After capture stops, before the reply is spoken
    pub pre_speech: Duration,
    /// After an utterance ends, before capture re-arms
    pub rearm: Duration,
}

impl SettleDelays {
    /// No settle time at all
    pub const fn none() -> Self {
        Self {
            pre_speech: Duration::ZERO,
            rearm: Duration::ZERO,
        }
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            pre_speech: Duration::from_millis(500),
            rearm: Duration::from_millis(1000),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tag passed through to the chat endpoint
    pub conversation_type: ConversationType,
    /// Initial locale
    pub language: Language,
    /// Start muted
    pub muted: bool,
    /// Re-arm capture after each spoken reply
    pub continuous: bool,
    /// Greeting override; the built-in table is used when unset
    pub greeting: Option<String>,
    /// Speak the greeting once after `greeting_delay`
    pub speak_greeting: bool,
    pub greeting_delay: Duration,
    /// Assistant reply appended when an exchange fails
    pub error_message: String,
    pub settle: SettleDelays,
    /// Per-locale settle overrides
    pub locale_overrides: HashMap<Language, SettleDelays>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            conversation_type: ConversationType::default(),
            language: Language::default(),
            muted: false,
            continuous: false,
            greeting: None,
            speak_greeting: true,
            greeting_delay: Duration::from_millis(1000),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            settle: SettleDelays::default(),
            locale_overrides: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Settle delays in effect for `language`
    pub fn delays_for(&self, language: Language) -> SettleDelays {
        self.locale_overrides
            .get(&language)
            .copied()
            .unwrap_or(self.settle)
    }

    /// The opening assistant message
    pub fn greeting_text(&self) -> String {
        match &self.greeting {
            Some(text) => text.clone(),
            None => greetings::greeting(&self.conversation_type, self.language).to_string(),
        }
    }
}
