//! Configuration file support

use parley_agent::SettleDelays;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default chat exchange endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

/// Configuration for parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat exchange endpoint URL
    pub endpoint: Option<String>,
    /// Conversation type tag (patient-assistant, patient-history, ...)
    pub conversation_type: Option<String>,
    /// Default locale tag (en-IN, hi-IN, ...)
    pub language: Option<String>,
    /// Start muted
    pub muted: Option<bool>,
    /// Re-arm capture after each spoken reply
    pub continuous: Option<bool>,
    /// Speak the greeting on startup
    pub speak_greeting: Option<bool>,
    /// Reply shown when an exchange fails
    pub error_message: Option<String>,
    /// Connect timeout for the chat endpoint, in seconds
    pub connect_timeout_secs: Option<u64>,
    /// Extra headers sent with every exchange
    pub headers: BTreeMap<String, String>,
    /// Settle delays
    pub settle: SettleSettings,
    /// Per-locale settle overrides, keyed by locale tag
    pub locale_settle: BTreeMap<String, SettleSettings>,
    /// Speech programs
    pub voice: VoiceSettings,
}

/// Settle delay configuration, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleSettings {
    pub pre_speech_ms: Option<u64>,
    pub rearm_ms: Option<u64>,
    pub greeting_ms: Option<u64>,
}

impl SettleSettings {
    /// Overlay the configured values on `base`
    pub fn apply(&self, base: SettleDelays) -> SettleDelays {
        SettleDelays {
            pre_speech: self
                .pre_speech_ms
                .map(Duration::from_millis)
                .unwrap_or(base.pre_speech),
            rearm: self.rearm_ms.map(Duration::from_millis).unwrap_or(base.rearm),
        }
    }
}

/// External speech programs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Text-to-speech program (espeak-ng when unset)
    pub tts_program: Option<String>,
    pub tts_args: Option<Vec<String>>,
    /// Tried once when the primary program fails
    pub fallback_tts_program: Option<String>,
    pub fallback_tts_args: Option<Vec<String>>,
    /// Speech-to-text program printing JSON transcript lines
    pub stt_program: Option<String>,
    pub stt_args: Option<Vec<String>>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            conversation_type: Some("patient-assistant".to_string()),
            language: Some("en-IN".to_string()),
            muted: Some(false),
            continuous: Some(false),
            speak_greeting: Some(true),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Settle delays for the default locale
    pub fn settle_delays(&self) -> SettleDelays {
        self.settle.apply(SettleDelays::default())
    }

    pub fn greeting_delay(&self) -> Option<Duration> {
        self.settle.greeting_ms.map(Duration::from_millis)
    }

    /// Locale tags whose override sets `greeting_ms`, which only applies
    /// under `[settle]`
    pub fn ignored_locale_greetings(&self) -> Vec<&str> {
        self.locale_settle
            .iter()
            .filter(|(_, settings)| settings.greeting_ms.is_some())
            .map(|(tag, _)| tag.as_str())
            .collect()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux/Mac) or %APPDATA%\parley\config.toml (Windows)

# Chat exchange endpoint
endpoint = "http://localhost:3000/api/chat"

# Conversation type passed to the endpoint (patient-assistant, patient-history)
conversation_type = "patient-assistant"

# Locale for capture and synthesis (en-IN, hi-IN, ta-IN, te-IN, bn-IN, mr-IN, gu-IN, kn-IN)
language = "en-IN"

# Start muted
muted = false

# Listen again after each spoken reply
continuous = false

# Extra request headers (optional)
[headers]
# authorization = "Bearer ..."

# Quiet intervals around the microphone/speaker handoff
[settle]
pre_speech_ms = 500
rearm_ms = 1000
greeting_ms = 1000

# Per-locale overrides (optional; greeting_ms only applies under [settle])
# [locale_settle."ta-IN"]
# rearm_ms = 1500

# Speech programs ({text}, {lang} and {lang_primary} are substituted)
[voice]
# tts_program = "espeak-ng"
# tts_args = ["-v", "{lang_primary}", "{text}"]
# fallback_tts_program = "say"
# fallback_tts_args = ["{text}"]
# stt_program = "parley-stt"
# stt_args = ["--locale", "{lang}"]
"#
}
