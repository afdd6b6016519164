//! parley-voice: Speech capture and synthesis
//!
//! Platform speech services sit behind the `SpeechRecognizer` and
//! `SpeechEngine` traits. The controllers here own the session lifecycle:
//! one capture session at a time, one utterance at a time.

pub mod capture;
pub mod error;
pub mod language;
pub mod process;
pub mod synthesis;

pub use capture::{CaptureController, SpeechRecognizer, TranscriptEvent, TranscriptStream};
pub use error::{Error, Result};
pub use language::Language;
pub use process::{CommandEngine, CommandRecognizer, Unavailable};
pub use synthesis::{SpeakOutcome, SpeechEngine, SynthesisController};
