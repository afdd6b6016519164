//! Slash commands for interactive mode

mod action;
mod language;

pub use action::ActionCommand;
pub use language::LanguageCommand;

use parley_voice::Language;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Start capture
    Listen,
    /// Stop capture
    Stop,
    /// Set the mute flag
    Mute(bool),
    /// Switch locale
    ChangeLanguage(Language),
    /// Turn continuous voice mode on or off
    Voice(bool),
    /// Submit text as a turn
    Submit(String),
    /// Print the conversation so far
    History,
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, current_language: Language) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "listen" | "l" => CommandResult::Listen,

        "stop" | "s" => CommandResult::Stop,

        "mute" => CommandResult::Mute(true),

        "unmute" => CommandResult::Mute(false),

        "lang" | "language" => LanguageCommand::execute(args, current_language),

        "voice" | "v" => match args.to_lowercase().as_str() {
            "on" | "true" | "1" => CommandResult::Voice(true),
            "off" | "false" | "0" => CommandResult::Voice(false),
            _ => CommandResult::Message("Usage: /voice on|off".to_string()),
        },

        "action" | "a" => ActionCommand::execute(args),

        "history" => CommandResult::History,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?         Show this help message
  /listen, /l           Start listening on the microphone
  /stop, /s             Stop listening
  /mute, /unmute        Turn spoken replies off or on
  /lang [tag]           List languages or switch (only while idle)
  /voice on|off         Listen again after each spoken reply
  /action, /a [id]      List quick actions or send one
  /history              Show the conversation so far
  /quit, /exit, /q      Exit parley

Examples:
  /lang hi-IN           Switch to Hindi
  /action symptom       Ask for help checking symptoms"#
        .to_string()
}
