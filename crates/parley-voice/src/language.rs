//! Supported capture/synthesis locales

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Closed set of locale tags understood by capture and synthesis.
///
/// The locale is bound when capture starts or an utterance begins, so it
/// can only change while nothing is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-IN")]
    EnglishIndia,
    #[serde(rename = "hi-IN")]
    Hindi,
    #[serde(rename = "ta-IN")]
    Tamil,
    #[serde(rename = "te-IN")]
    Telugu,
    #[serde(rename = "bn-IN")]
    Bengali,
    #[serde(rename = "mr-IN")]
    Marathi,
    #[serde(rename = "gu-IN")]
    Gujarati,
    #[serde(rename = "kn-IN")]
    Kannada,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::EnglishIndia,
        Language::Hindi,
        Language::Tamil,
        Language::Telugu,
        Language::Bengali,
        Language::Marathi,
        Language::Gujarati,
        Language::Kannada,
    ];

    /// BCP 47 tag
    pub fn tag(&self) -> &'static str {
        match self {
            Language::EnglishIndia => "en-IN",
            Language::Hindi => "hi-IN",
            Language::Tamil => "ta-IN",
            Language::Telugu => "te-IN",
            Language::Bengali => "bn-IN",
            Language::Marathi => "mr-IN",
            Language::Gujarati => "gu-IN",
            Language::Kannada => "kn-IN",
        }
    }

    /// Primary language subtag (e.g. "hi"), as most TTS voices are named
    pub fn primary(&self) -> &'static str {
        let tag = self.tag();
        &tag[..2]
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::EnglishIndia => "English",
            Language::Hindi => "Hindi",
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
            Language::Bengali => "Bengali",
            Language::Marathi => "Marathi",
            Language::Gujarati => "Gujarati",
            Language::Kannada => "Kannada",
        }
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Language::EnglishIndia => "English",
            Language::Hindi => "हिंदी",
            Language::Tamil => "தமிழ்",
            Language::Telugu => "తెలుగు",
            Language::Bengali => "বাংলা",
            Language::Marathi => "मराठी",
            Language::Gujarati => "ગુજરાતી",
            Language::Kannada => "ಕನ್ನಡ",
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|l| l.tag().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownLanguage(wanted.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("hi-IN".parse::<Language>().unwrap(), Language::Hindi);
        assert_eq!("KN-in".parse::<Language>().unwrap(), Language::Kannada);
        assert!("fr-FR".parse::<Language>().is_err());
    }

    #[test]
    fn test_serde_uses_tag() {
        assert_eq!(serde_json::to_string(&Language::Tamil).unwrap(), "\"ta-IN\"");
        let parsed: Language = serde_json::from_str("\"gu-IN\"").unwrap();
        assert_eq!(parsed, Language::Gujarati);
    }

    #[test]
    fn test_tags_round_trip_through_from_str() {
        for lang in Language::ALL {
            assert_eq!(lang.tag().parse::<Language>().unwrap(), lang);
        }
        assert_eq!(Language::Bengali.primary(), "bn");
    }
}
