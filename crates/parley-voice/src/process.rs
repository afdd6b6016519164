//! Capture and synthesis backed by external programs

use async_stream::stream;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{
    capture::{SpeechRecognizer, TranscriptEvent, TranscriptStream},
    error::{Error, Result},
    language::Language,
    synthesis::SpeechEngine,
};

/// Substitute `{text}`, `{lang}` and `{lang_primary}` in argument templates
fn render_args(args: &[String], text: &str, language: Language) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{lang_primary}", language.primary())
                .replace("{lang}", language.tag())
                .replace("{text}", text)
        })
        .collect()
}

/// Check whether `program` resolves to a file, searching PATH for bare names
pub fn program_available(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Speaks by running a program to completion per utterance
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// espeak-ng, voiced by primary language subtag
    pub fn espeak() -> Self {
        Self::new(
            "espeak-ng",
            vec!["-v".into(), "{lang_primary}".into(), "{text}".into()],
        )
    }
}

#[async_trait]
impl SpeechEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_supported(&self) -> bool {
        program_available(&self.program)
    }

    async fn synthesize(
        &self,
        text: &str,
        language: Language,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(render_args(&self.args, text, language))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Ok(())
            }
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Synthesis(format!("{} exited with {}", self.program, status)))
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct RecognizerLine {
    text: String,
    #[serde(default, rename = "final")]
    is_final: bool,
}

/// Parse one line of recognizer output: `{"text": "...", "final": true}`
fn parse_transcript_line(line: &str) -> Option<TranscriptEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RecognizerLine>(line) {
        Ok(parsed) => Some(TranscriptEvent {
            text: parsed.text,
            is_final: parsed.is_final,
        }),
        Err(e) => {
            tracing::debug!("Ignoring recognizer output {:?}: {}", line, e);
            None
        }
    }
}

/// Listens through a long-running program that prints transcript lines.
///
/// The process lives as long as the returned stream; dropping the stream
/// kills it.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn is_supported(&self) -> bool {
        program_available(&self.program)
    }

    async fn listen(&self, language: Language) -> Result<TranscriptStream> {
        let mut child = Command::new(&self.program)
            .args(render_args(&self.args, "", language))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Capture(format!("{} has no stdout", self.program)))?;
        let program = self.program.clone();

        Ok(Box::pin(stream! {
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_transcript_line(&line) {
                            yield event;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Reading from {} failed: {}", program, e);
                        break;
                    }
                }
            }
            tracing::debug!("{} closed its output", program);
        }))
    }
}

/// Stand-in for a missing platform capability
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl SpeechRecognizer for Unavailable {
    fn is_supported(&self) -> bool {
        false
    }

    async fn listen(&self, _language: Language) -> Result<TranscriptStream> {
        Err(Error::capture_unsupported())
    }
}

#[async_trait]
impl SpeechEngine for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_supported(&self) -> bool {
        false
    }

    async fn synthesize(
        &self,
        _text: &str,
        _language: Language,
        _cancel: CancellationToken,
    ) -> Result<()> {
        Err(Error::synthesis_unsupported())
    }
}
