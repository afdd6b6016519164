//! parley - voice-enabled health assistant conversations

mod commands;
mod config;

use clap::Parser;
use commands::CommandResult;
use config::{Config, VoiceSettings};
use parley_agent::config::DEFAULT_ERROR_MESSAGE;
use parley_agent::{
    ConversationEvent, ConversationHandle, ErrorKind, Orchestrator, OrchestratorConfig, Phase,
    Snapshot,
};
use parley_ai::{ConversationType, HttpChatClient};
use parley_voice::{
    CaptureController, CommandEngine, CommandRecognizer, Language, SpeechEngine, SpeechRecognizer,
    SynthesisController, Unavailable,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// parley - talk to a health assistant by voice or text
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat exchange endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Conversation type (patient-assistant, patient-history)
    #[arg(short = 't', long = "type")]
    conversation_type: Option<String>,

    /// Locale tag (en-IN, hi-IN, ta-IN, te-IN, bn-IN, mr-IN, gu-IN, kn-IN)
    #[arg(short, long)]
    lang: Option<String>,

    /// Start with spoken replies turned off
    #[arg(short, long)]
    muted: bool,

    /// Listen again after each spoken reply
    #[arg(long)]
    voice: bool,

    /// Don't speak the greeting
    #[arg(long)]
    no_greeting: bool,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let file_config = Config::load();
    let orchestrator_config = build_orchestrator_config(&args, &file_config)?;

    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| file_config.endpoint.clone())
        .unwrap_or_else(|| config::DEFAULT_ENDPOINT.to_string());
    let timeout = Duration::from_secs(
        file_config
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
    );
    let mut client = HttpChatClient::with_connect_timeout(endpoint, timeout)?;
    for (name, value) in &file_config.headers {
        client = client.with_header(name, value)?;
    }
    tracing::debug!("Chat endpoint: {}", client.endpoint());

    let (capture, synthesis) = build_voice(&file_config.voice);
    let label = format!(
        "{}, {}",
        orchestrator_config.conversation_type, orchestrator_config.language
    );

    let (orchestrator, handle) =
        Orchestrator::new(orchestrator_config, Arc::new(client), capture, synthesis);
    let printer = tokio::spawn(print_events(handle.subscribe()));
    let conversation = orchestrator.spawn();

    let result = match args.command {
        Some(command) => run_single(&handle, command).await,
        None => run_interactive(&handle, &label).await,
    };

    handle.close();
    handle.closed().await;
    conversation.await?;
    finish_printer(printer).await;

    result
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("parley_cli=debug,parley_agent=debug,parley_ai=debug,parley_voice=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge command-line flags over the config file
fn build_orchestrator_config(args: &Args, file: &Config) -> anyhow::Result<OrchestratorConfig> {
    let language = match args.lang.as_deref().or(file.language.as_deref()) {
        Some(tag) => tag.parse::<Language>()?,
        None => Language::default(),
    };

    let conversation_type = args
        .conversation_type
        .as_deref()
        .or(file.conversation_type.as_deref())
        .map(ConversationType::from)
        .unwrap_or_default();

    let settle = file.settle_delays();
    let mut locale_overrides = HashMap::new();
    for tag in file.ignored_locale_greetings() {
        tracing::warn!(
            "Ignoring greeting_ms under [locale_settle.\"{}\"]; set it under [settle]",
            tag
        );
    }
    for (tag, settings) in &file.locale_settle {
        match tag.parse::<Language>() {
            Ok(locale) => {
                locale_overrides.insert(locale, settings.apply(settle));
            }
            Err(e) => tracing::warn!("Ignoring settle override: {}", e),
        }
    }

    let defaults = OrchestratorConfig::default();

    Ok(OrchestratorConfig {
        conversation_type,
        language,
        muted: args.muted || file.muted.unwrap_or(false),
        continuous: args.voice || file.continuous.unwrap_or(false),
        greeting: None,
        // A one-shot prompt shouldn't wait on the greeting being read out
        speak_greeting: !args.no_greeting
            && args.command.is_none()
            && file.speak_greeting.unwrap_or(true),
        greeting_delay: file.greeting_delay().unwrap_or(defaults.greeting_delay),
        error_message: file
            .error_message
            .clone()
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        settle,
        locale_overrides,
    })
}

/// Build the capture and synthesis controllers from the configured programs
fn build_voice(voice: &VoiceSettings) -> (CaptureController, SynthesisController) {
    let recognizer: Arc<dyn SpeechRecognizer> = match &voice.stt_program {
        Some(program) => Arc::new(CommandRecognizer::new(
            program.clone(),
            voice.stt_args.clone().unwrap_or_default(),
        )),
        None => Arc::new(Unavailable),
    };

    let primary: Arc<dyn SpeechEngine> = match &voice.tts_program {
        Some(program) => Arc::new(CommandEngine::new(
            program.clone(),
            voice
                .tts_args
                .clone()
                .unwrap_or_else(|| vec!["{text}".to_string()]),
        )),
        None => Arc::new(CommandEngine::espeak()),
    };

    let mut synthesis = SynthesisController::new(primary);
    if let Some(program) = &voice.fallback_tts_program {
        let args = voice
            .fallback_tts_args
            .clone()
            .unwrap_or_else(|| vec!["{text}".to_string()]);
        synthesis = synthesis.with_fallback(Arc::new(CommandEngine::new(program.clone(), args)));
    }

    (CaptureController::new(recognizer), synthesis)
}

/// Submit one prompt and wait for the reply
async fn run_single(handle: &ConversationHandle, command: String) -> anyhow::Result<()> {
    println!("parley> {}", command);
    println!();

    // greeting + prompt + reply
    let expected = handle.snapshot().messages.len() + 2;
    handle.submit(command)?;

    let mut snapshots = handle.watch();
    let _ = snapshots
        .wait_for(|s| {
            s.phase() == Phase::Closed
                || (s.messages.len() >= expected
                    && matches!(s.phase(), Phase::Idle | Phase::Listening))
        })
        .await;

    Ok(())
}

async fn run_interactive(handle: &ConversationHandle, label: &str) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("parley ({})", label);
        eprintln!("Type /help for commands");
        eprintln!();
    }

    if let Some(greeting) = handle.snapshot().last_message() {
        println!("{}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let language = handle.snapshot().state.language;
        let Some(result) = commands::execute_command(input, language) else {
            handle.submit(input)?;
            continue;
        };

        match result {
            CommandResult::Listen => handle.start_listening()?,
            CommandResult::Stop => handle.stop_listening()?,
            CommandResult::Mute(muted) => {
                handle.set_muted(muted)?;
                println!("{}", if muted { "Muted." } else { "Unmuted." });
            }
            CommandResult::ChangeLanguage(language) => handle.set_language(language)?,
            CommandResult::Voice(on) => {
                handle.set_continuous(on)?;
                println!("Continuous voice mode {}.", if on { "on" } else { "off" });
            }
            CommandResult::Submit(text) => {
                println!("you> {}", text);
                handle.submit(text)?;
            }
            CommandResult::History => print_history(&handle.snapshot()),
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => break,
            CommandResult::Unknown(cmd) => {
                println!("Unknown command: /{}", cmd);
                println!("Type /help for available commands.");
            }
        }
    }

    Ok(())
}

fn print_history(snapshot: &Snapshot) {
    if snapshot.messages.is_empty() {
        println!("No messages yet.");
        return;
    }

    for (i, message) in snapshot.messages.iter().enumerate() {
        let who = if message.is_user() { "you" } else { "assistant" };
        println!("  {}: [{}] {}", i, who, message.content.replace('\n', " "));
    }

    if let Some(progress) = snapshot.progress {
        println!("\nHistory collected: {}%", progress);
    }
}

/// Render conversation events until the conversation closes
async fn print_events(mut events: broadcast::Receiver<ConversationEvent>) {
    let mut streamed = false;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Display fell behind by {} events", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if event.is_terminal() {
            break;
        }

        match event {
            ConversationEvent::MessageUpdate { delta, .. } => {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
                streamed = true;
            }
            ConversationEvent::MessageEnd { message } if message.is_assistant() => {
                if streamed {
                    println!();
                } else {
                    println!("{}", message.content);
                }
                streamed = false;
            }
            ConversationEvent::TranscriptUpdated {
                text,
                is_final: true,
            } => {
                eprintln!("[heard: {}]", text);
            }
            ConversationEvent::PhaseChanged {
                to: Phase::Listening,
                ..
            } => {
                eprintln!("[listening]");
            }
            ConversationEvent::Rejected { reason } => {
                eprintln!("[{}]", reason);
            }
            ConversationEvent::Error { kind, message } => {
                if streamed {
                    println!();
                    streamed = false;
                }
                eprintln!("[{}] {}", error_label(kind), message);
            }
            _ => {}
        }
    }
}

fn error_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::ChatTransport => "connection error",
        ErrorKind::SynthesisFailure => "speech error",
        ErrorKind::Capture => "microphone error",
    }
}

async fn finish_printer(printer: JoinHandle<()>) {
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        tracing::debug!("Event printer did not finish after close");
    }
}
