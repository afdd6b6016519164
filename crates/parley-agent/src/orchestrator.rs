//! The turn-taking state machine.
//!
//! One task owns the conversation and waits on every source of input at
//! once: handle commands, capture events, the reply stream, the current
//! utterance and the pending settle timer. Each input is handled to
//! completion before the next is polled, then a new snapshot is published.

use async_stream::stream;
use futures::StreamExt;
use futures::future::BoxFuture;
use parley_ai::{
    ChatClient, ChatEvent, ChatEventStream, ConversationType, Message, TranscriptAccumulator,
};
use parley_voice::{
    CaptureController, Language, SpeakOutcome, SynthesisController, TranscriptEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    config::{OrchestratorConfig, SettleDelays},
    conversation::{ConversationState, Phase, Snapshot, history_progress},
    error::Error,
    events::{ConversationEvent, ErrorKind},
    handle::{Command, ConversationHandle},
};

/// What a pending timer does when it fires
#[derive(Debug)]
enum Settle {
    /// Speak the opening message
    Greeting,
    /// Speak the finished reply
    PreSpeech(String),
    /// Restart capture in continuous mode
    Rearm,
}

struct Timer {
    deadline: Instant,
    settle: Settle,
}

impl Timer {
    fn after(delay: Duration, settle: Settle) -> Self {
        Self {
            deadline: Instant::now() + delay,
            settle,
        }
    }
}

/// The one outstanding chat exchange
struct Exchange {
    events: ChatEventStream,
    reply: TranscriptAccumulator,
}

/// Owns one conversation: its state, history, and the capture, chat and
/// synthesis resources.
pub struct Orchestrator {
    config: OrchestratorConfig,
    client: Arc<dyn ChatClient>,
    capture: CaptureController,
    synthesis: SynthesisController,

    conversation_id: Uuid,
    state: ConversationState,
    messages: Vec<Message>,
    turn_number: u32,
    progress: Option<u8>,
    capture_supported: bool,
    synthesis_supported: bool,

    exchange: Option<Exchange>,
    speech: Option<BoxFuture<'static, SpeakOutcome>>,
    timer: Option<Timer>,

    commands: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
    event_tx: broadcast::Sender<ConversationEvent>,
    version: u64,
}

impl Orchestrator {
    /// Create a conversation seeded with its greeting.
    ///
    /// Nothing happens until [`Orchestrator::run`] is polled.
    pub fn new(
        config: OrchestratorConfig,
        client: Arc<dyn ChatClient>,
        capture: CaptureController,
        synthesis: SynthesisController,
    ) -> (Self, ConversationHandle) {
        let conversation_id = Uuid::new_v4();
        let state = ConversationState {
            phase: Phase::Idle,
            language: config.language,
            muted: config.muted,
            continuous: config.continuous,
            pending_transcript: String::new(),
        };
        let messages = vec![Message::assistant(config.greeting_text())];
        let progress = matches!(config.conversation_type, ConversationType::PatientHistory)
            .then(|| history_progress(messages.len()));
        let capture_supported = capture.is_supported();
        let synthesis_supported = synthesis.is_supported();

        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            version: 0,
            conversation_id,
            state: state.clone(),
            messages: messages.clone(),
            streaming: None,
            capture_supported,
            synthesis_supported,
            progress,
        });
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(256);

        let handle = ConversationHandle::new(command_tx, snapshot_rx, event_tx.clone());
        let orchestrator = Self {
            config,
            client,
            capture,
            synthesis,
            conversation_id,
            state,
            messages,
            turn_number: 0,
            progress,
            capture_supported,
            synthesis_supported,
            exchange: None,
            speech: None,
            timer: None,
            commands,
            snapshot_tx,
            event_tx,
            version: 0,
        };
        (orchestrator, handle)
    }

    /// Run the conversation on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the conversation until it is closed or every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            "Conversation {} started ({}, {})",
            self.conversation_id,
            self.config.conversation_type,
            self.state.language
        );
        self.schedule_greeting();
        self.publish();

        loop {
            let deadline = self.timer.as_ref().map(|t| t.deadline);

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => self.teardown(),
                },
                event = self.capture.next_event() => self.handle_transcript(event),
                event = next_chat_event(&mut self.exchange) => self.handle_chat_event(event),
                outcome = next_outcome(&mut self.speech) => self.handle_speech_end(outcome),
                _ = settle(deadline) => self.handle_timer().await,
            }

            if self.state.phase == Phase::Closed {
                break;
            }
            self.publish();
        }
    }

    async fn handle_command(&mut self, command: Command) {
        tracing::debug!("Command {:?} in {}", command, self.state.phase);
        match command {
            Command::StartListening => self.start_listening().await,
            Command::StopListening => self.stop_listening(),
            Command::ToggleListening => {
                if self.state.phase == Phase::Listening {
                    self.stop_listening();
                } else {
                    self.start_listening().await;
                }
            }
            Command::Submit(text) => self.submit(&text),
            Command::SetMuted(muted) => self.set_muted(muted),
            Command::ToggleMute => self.set_muted(!self.state.muted),
            Command::SetLanguage(language) => self.set_language(language),
            Command::SetContinuous(continuous) => {
                self.state.continuous = continuous;
                if !continuous {
                    self.clear_rearm();
                }
            }
            Command::Close => self.teardown(),
        }
    }

    // --- capture ---

    async fn start_listening(&mut self) {
        self.clear_rearm();
        match self.state.phase {
            Phase::Listening => {}
            Phase::Idle => self.arm_capture().await,
            phase => self.reject(format!("cannot start listening while {}", phase)),
        }
    }

    fn stop_listening(&mut self) {
        self.clear_rearm();
        if self.state.phase != Phase::Listening {
            return;
        }
        self.capture.stop();
        self.state.pending_transcript.clear();
        self.set_phase(Phase::Idle);
    }

    async fn arm_capture(&mut self) {
        match self.capture.start(self.state.language).await {
            Ok(()) => {
                self.state.pending_transcript.clear();
                self.set_phase(Phase::Listening);
            }
            Err(e) => {
                if e.is_unsupported() {
                    self.capture_supported = false;
                }
                self.report(Error::from(e));
            }
        }
    }

    fn handle_transcript(&mut self, event: Option<TranscriptEvent>) {
        let Some(event) = event else {
            if self.state.phase == Phase::Listening {
                self.state.pending_transcript.clear();
                self.set_phase(Phase::Idle);
            }
            return;
        };

        self.emit(ConversationEvent::TranscriptUpdated {
            text: event.text.clone(),
            is_final: event.is_final,
        });

        if !event.is_final {
            self.state.pending_transcript = event.text;
            return;
        }

        self.state.pending_transcript.clear();
        if event.text.trim().is_empty() {
            tracing::debug!("Discarding empty final transcript");
            return;
        }
        self.submit(&event.text);
    }

    // --- exchange ---

    fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.state.phase.accepts_submission() {
            self.reject(format!("cannot submit while {}", self.state.phase));
            return;
        }

        self.timer = None;
        self.capture.stop();
        self.state.pending_transcript.clear();

        let message = Message::user(text);
        self.messages.push(message.clone());
        self.emit(ConversationEvent::MessageEnd { message });

        self.turn_number += 1;
        tracing::info!("Turn {} submitted", self.turn_number);
        self.emit(ConversationEvent::TurnStart {
            turn_number: self.turn_number,
        });

        self.exchange = Some(Exchange {
            events: open_exchange(
                Arc::clone(&self.client),
                self.messages.clone(),
                self.config.conversation_type.clone(),
            ),
            reply: TranscriptAccumulator::new(),
        });
        self.set_phase(Phase::Thinking);
    }

    fn handle_chat_event(&mut self, event: Option<ChatEvent>) {
        match event {
            Some(ChatEvent::Delta { text: delta }) => {
                let Some(exchange) = self.exchange.as_mut() else {
                    return;
                };
                if exchange.reply.process_event(&ChatEvent::delta(delta.clone())) {
                    let text = exchange.reply.text().to_string();
                    self.emit(ConversationEvent::MessageUpdate { delta, text });
                }
            }
            Some(ChatEvent::Done) | None => {
                if let Some(exchange) = self.exchange.take() {
                    self.finish_turn(exchange.reply);
                }
            }
            Some(ChatEvent::Error { message }) => self.fail_turn(message),
        }
    }

    fn finish_turn(&mut self, mut reply: TranscriptAccumulator) {
        reply.complete();
        let message = reply.into_message();
        let text = message.content.clone();

        self.push_reply(message.clone());
        tracing::info!("Turn {} complete ({} bytes)", self.turn_number, text.len());
        self.emit(ConversationEvent::MessageEnd { message });

        self.speak_reply(text);
    }

    fn fail_turn(&mut self, message: String) {
        self.exchange = None;
        tracing::warn!("Chat exchange failed: {}", message);
        self.emit(ConversationEvent::Error {
            kind: ErrorKind::ChatTransport,
            message,
        });

        let reply = Message::assistant(self.config.error_message.clone());
        self.push_reply(reply.clone());
        self.emit(ConversationEvent::MessageEnd { message: reply });
        self.set_phase(Phase::Idle);
    }

    fn push_reply(&mut self, message: Message) {
        self.messages.push(message);
        if self.progress.is_some() {
            self.progress = Some(history_progress(self.messages.len()));
        }
    }

    // --- synthesis ---

    fn speak_reply(&mut self, text: String) {
        if self.state.muted {
            tracing::debug!("Muted, reply not spoken");
            self.set_phase(Phase::Idle);
            return;
        }
        if text.trim().is_empty() {
            tracing::debug!("Empty reply, nothing to speak");
            self.set_phase(Phase::Idle);
            return;
        }
        if !self.synthesis.is_supported() {
            self.synthesis_unavailable();
            self.set_phase(Phase::Idle);
            self.schedule_rearm();
            return;
        }

        self.capture.stop();
        self.timer = Some(Timer::after(self.delays().pre_speech, Settle::PreSpeech(text)));
        self.set_phase(Phase::Speaking);
    }

    fn begin_speech(&mut self, text: String) {
        let synthesis = self.synthesis.clone();
        let language = self.state.language;
        self.emit(ConversationEvent::SpeechStart { text: text.clone() });
        self.speech = Some(Box::pin(async move { synthesis.speak(&text, language).await }));
    }

    fn handle_speech_end(&mut self, outcome: SpeakOutcome) {
        self.speech = None;
        if !outcome.is_completed() {
            tracing::debug!("Utterance ended early: {:?}", outcome);
        }
        if let SpeakOutcome::Failed { message } = &outcome {
            self.emit(ConversationEvent::Error {
                kind: ErrorKind::SynthesisFailure,
                message: message.clone(),
            });
        }
        self.emit(ConversationEvent::SpeechEnd { outcome });

        if self.state.phase == Phase::Speaking {
            self.set_phase(Phase::Idle);
            self.schedule_rearm();
        }
    }

    fn synthesis_unavailable(&mut self) {
        if self.synthesis_supported {
            self.synthesis_supported = false;
            self.report(Error::from(parley_voice::Error::synthesis_unsupported()));
        }
    }

    fn set_muted(&mut self, muted: bool) {
        if self.state.muted == muted {
            return;
        }
        self.state.muted = muted;
        tracing::debug!("Muted: {}", muted);
        if !muted {
            return;
        }

        // Pending greeting, pre-speech and re-arm timers all die with mute.
        self.timer = None;
        if self.speech.is_some() {
            self.synthesis.cancel();
        } else if self.state.phase == Phase::Speaking {
            self.set_phase(Phase::Idle);
        }
    }

    // --- timers ---

    fn schedule_greeting(&mut self) {
        if !self.config.speak_greeting || self.state.muted {
            return;
        }
        if !self.synthesis.is_supported() {
            tracing::debug!("Synthesis unavailable, greeting stays text-only");
            return;
        }
        self.timer = Some(Timer::after(self.config.greeting_delay, Settle::Greeting));
    }

    fn schedule_rearm(&mut self) {
        if !self.state.continuous || self.state.muted || !self.capture_supported {
            return;
        }
        let delay = self.delays().rearm;
        tracing::debug!("Re-arming capture in {:?}", delay);
        self.timer = Some(Timer::after(delay, Settle::Rearm));
    }

    fn clear_rearm(&mut self) {
        if matches!(self.timer, Some(Timer { settle: Settle::Rearm, .. })) {
            self.timer = None;
        }
    }

    async fn handle_timer(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        match timer.settle {
            Settle::Greeting => {
                if self.state.phase != Phase::Idle || self.state.muted {
                    return;
                }
                let Some(greeting) = self.messages.first().filter(|m| m.is_assistant()) else {
                    return;
                };
                let text = greeting.content.clone();
                self.set_phase(Phase::Speaking);
                self.begin_speech(text);
            }
            Settle::PreSpeech(text) => {
                if self.state.phase == Phase::Speaking {
                    self.begin_speech(text);
                }
            }
            Settle::Rearm => {
                if self.state.phase == Phase::Idle && self.state.continuous && !self.state.muted {
                    self.arm_capture().await;
                }
            }
        }
    }

    // --- misc ---

    fn set_language(&mut self, language: Language) {
        if self.state.phase != Phase::Idle {
            self.reject(format!("cannot change language while {}", self.state.phase));
            return;
        }
        if self.state.language != language {
            tracing::info!("Language changed to {}", language);
            self.state.language = language;
        }
    }

    /// Stop everything regardless of phase. Idempotent.
    fn teardown(&mut self) {
        if self.state.phase == Phase::Closed {
            return;
        }
        self.capture.stop();
        self.synthesis.cancel();
        self.speech = None;
        if self.exchange.take().is_some() {
            tracing::debug!("Abandoning in-flight exchange");
        }
        self.timer = None;
        self.state.pending_transcript.clear();

        self.set_phase(Phase::Closed);
        self.emit(ConversationEvent::Closed);
        self.publish();
        tracing::info!("Conversation {} closed", self.conversation_id);
    }

    fn delays(&self) -> SettleDelays {
        self.config.delays_for(self.state.language)
    }

    fn set_phase(&mut self, to: Phase) {
        let from = self.state.phase;
        if from == to {
            return;
        }
        tracing::debug!("Phase {} -> {}", from, to);
        self.state.phase = to;
        self.emit(ConversationEvent::PhaseChanged { from, to });
    }

    fn reject(&mut self, reason: String) {
        let error = Error::Rejected(reason);
        tracing::debug!("{}", error);
        self.emit(ConversationEvent::Rejected {
            reason: error.to_string(),
        });
    }

    fn report(&mut self, error: Error) {
        tracing::warn!("{}", error);
        if let Some(kind) = error.kind() {
            self.emit(ConversationEvent::Error {
                kind,
                message: error.to_string(),
            });
        }
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn publish(&mut self) {
        self.version += 1;
        let snapshot = Snapshot {
            version: self.version,
            conversation_id: self.conversation_id,
            state: self.state.clone(),
            messages: self.messages.clone(),
            streaming: self.exchange.as_ref().map(|e| e.reply.text().to_string()),
            capture_supported: self.capture_supported,
            synthesis_supported: self.synthesis_supported,
            progress: self.progress,
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Open an exchange as a stream. A failed request becomes a single error event.
fn open_exchange(
    client: Arc<dyn ChatClient>,
    history: Vec<Message>,
    conversation_type: ConversationType,
) -> ChatEventStream {
    Box::pin(stream! {
        match client.send(&history, &conversation_type).await {
            Ok(mut events) => {
                while let Some(event) = events.next().await {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        break;
                    }
                }
            }
            Err(e) => {
                yield ChatEvent::Error { message: e.to_string() };
            }
        }
    })
}

async fn next_chat_event(exchange: &mut Option<Exchange>) -> Option<ChatEvent> {
    match exchange {
        Some(exchange) => exchange.events.next().await,
        None => std::future::pending().await,
    }
}

async fn next_outcome(speech: &mut Option<BoxFuture<'static, SpeakOutcome>>) -> SpeakOutcome {
    match speech {
        Some(speech) => speech.await,
        None => std::future::pending().await,
    }
}

async fn settle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greetings;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_voice::{SpeechEngine, SpeechRecognizer, TranscriptStream, Unavailable};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    const WAIT: Duration = Duration::from_secs(2);

    // --- mock chat endpoint ---

    enum Reply {
        Events(Vec<ChatEvent>),
        Status(u16),
        Hang,
    }

    fn reply(parts: &[&str]) -> Reply {
        Reply::Events(
            parts
                .iter()
                .map(|p| ChatEvent::delta(*p))
                .chain([ChatEvent::Done])
                .collect(),
        )
    }

    struct MockChatClient {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicU32,
        last_history: Mutex<Vec<Message>>,
    }

    impl MockChatClient {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
                last_history: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_history(&self) -> Vec<Message> {
            self.last_history.lock().clone()
        }
    }

    #[async_trait]
    impl ChatClient for MockChatClient {
        async fn send(
            &self,
            history: &[Message],
            _conversation_type: &ConversationType,
        ) -> parley_ai::Result<ChatEventStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_history.lock() = history.to_vec();
            let next = self.replies.lock().pop_front();
            match next {
                Some(Reply::Events(events)) => Ok(Box::pin(futures::stream::iter(events))),
                Some(Reply::Status(status)) => Err(parley_ai::Error::status(status, "boom")),
                Some(Reply::Hang) | None => Ok(Box::pin(futures::stream::pending::<ChatEvent>())),
            }
        }
    }

    // --- mock recognizer ---

    struct ActiveGuard(Arc<AtomicBool>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    struct MockRecognizer {
        supported: bool,
        listens: AtomicU32,
        languages: Mutex<Vec<Language>>,
        active: Arc<AtomicBool>,
        sender: Mutex<Option<mpsc::UnboundedSender<TranscriptEvent>>>,
    }

    impl MockRecognizer {
        fn new(supported: bool) -> Arc<Self> {
            Arc::new(Self {
                supported,
                listens: AtomicU32::new(0),
                languages: Mutex::new(Vec::new()),
                active: Arc::new(AtomicBool::new(false)),
                sender: Mutex::new(None),
            })
        }

        fn say(&self, text: &str, is_final: bool) {
            if let Some(tx) = self.sender.lock().as_ref() {
                let _ = tx.send(TranscriptEvent {
                    text: text.to_string(),
                    is_final,
                });
            }
        }

        fn listens(&self) -> u32 {
            self.listens.load(Ordering::SeqCst)
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for MockRecognizer {
        fn is_supported(&self) -> bool {
            self.supported
        }

        async fn listen(&self, language: Language) -> parley_voice::Result<TranscriptStream> {
            self.listens.fetch_add(1, Ordering::SeqCst);
            self.languages.lock().push(language);
            let (tx, mut rx) = mpsc::unbounded_channel();
            *self.sender.lock() = Some(tx);
            self.active.store(true, Ordering::SeqCst);
            let guard = ActiveGuard(Arc::clone(&self.active));
            Ok(Box::pin(stream! {
                let _guard = guard;
                while let Some(event) = rx.recv().await {
                    yield event;
                }
            }))
        }
    }

    // --- mock synthesis ---

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Block,
    }

    struct MockEngine {
        behavior: Behavior,
        calls: AtomicU32,
        spoken: Mutex<Vec<String>>,
    }

    impl MockEngine {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
                spoken: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().clone()
        }
    }

    #[async_trait]
    impl SpeechEngine for MockEngine {
        fn name(&self) -> &str {
            "mock"
        }

        fn is_supported(&self) -> bool {
            true
        }

        async fn synthesize(
            &self,
            text: &str,
            _language: Language,
            cancel: CancellationToken,
        ) -> parley_voice::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.spoken.lock().push(text.to_string());
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(parley_voice::Error::Synthesis("voice missing".into())),
                Behavior::Block => {
                    cancel.cancelled().await;
                    Ok(())
                }
            }
        }
    }

    // --- harness ---

    struct Harness {
        handle: ConversationHandle,
        client: Arc<MockChatClient>,
        recognizer: Arc<MockRecognizer>,
        synthesis: SynthesisController,
        task: JoinHandle<()>,
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            speak_greeting: false,
            greeting_delay: Duration::ZERO,
            settle: SettleDelays::none(),
            ..Default::default()
        }
    }

    fn continuous_config() -> OrchestratorConfig {
        OrchestratorConfig {
            continuous: true,
            ..test_config()
        }
    }

    fn start(
        config: OrchestratorConfig,
        client: Arc<MockChatClient>,
        recognizer: Arc<MockRecognizer>,
        synthesis: SynthesisController,
    ) -> Harness {
        let capture = CaptureController::new(recognizer.clone());
        let (orchestrator, handle) =
            Orchestrator::new(config, client.clone(), capture, synthesis.clone());
        Harness {
            handle,
            client,
            recognizer,
            synthesis,
            task: orchestrator.spawn(),
        }
    }

    async fn wait_until(
        handle: &ConversationHandle,
        mut predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Snapshot {
        let mut rx = handle.watch();
        tokio::time::timeout(WAIT, rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for snapshot")
            .expect("orchestrator gone")
            .clone()
    }

    async fn next_matching(
        events: &mut broadcast::Receiver<ConversationEvent>,
        mut predicate: impl FnMut(&ConversationEvent) -> bool,
    ) -> ConversationEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream ended: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    fn idle_with(messages: usize) -> impl FnMut(&Snapshot) -> bool {
        move |s| s.phase() == Phase::Idle && s.messages.len() == messages
    }

    // --- tests ---

    #[tokio::test]
    async fn test_typed_turn_is_spoken_then_idle() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            test_config(),
            MockChatClient::new(vec![reply(&["Fever ", "is ", "a ", "symptom."])]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );

        h.handle.submit("What is fever?").unwrap();
        let snapshot = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(snapshot.messages[1], Message::user("What is fever?"));
        assert_eq!(snapshot.messages[2], Message::assistant("Fever is a symptom."));
        assert_eq!(snapshot.streaming, None);
        assert_eq!(engine.spoken(), vec!["Fever is a symptom.".to_string()]);
        assert_eq!(h.client.calls(), 1);
        assert_eq!(h.client.last_history().len(), 2);
        assert_eq!(h.recognizer.listens(), 0);
    }

    #[tokio::test]
    async fn test_message_updates_track_buffer() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![reply(&["Fever ", "is ", "a ", "symptom."])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );
        let mut events = h.handle.subscribe();

        h.handle.submit("What is fever?").unwrap();
        let mut seen = Vec::new();
        while seen.len() < 4 {
            if let ConversationEvent::MessageUpdate { text, .. } =
                next_matching(&mut events, |e| matches!(e, ConversationEvent::MessageUpdate { .. }))
                    .await
            {
                seen.push(text);
            }
        }

        assert_eq!(
            seen,
            vec!["Fever ", "Fever is ", "Fever is a ", "Fever is a symptom."]
        );
    }

    #[tokio::test]
    async fn test_continuous_mode_rearms_after_speaking() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            continuous_config(),
            MockChatClient::new(vec![reply(&["Fever ", "is ", "a ", "symptom."])]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;

        h.recognizer.say("what is", false);
        wait_until(&h.handle, |s| s.state.pending_transcript == "what is").await;

        h.recognizer.say("What is fever?", true);
        let snapshot = wait_until(&h.handle, |s| {
            s.phase() == Phase::Listening && s.messages.len() == 3
        })
        .await;

        assert_eq!(snapshot.messages[2].content, "Fever is a symptom.");
        assert!(snapshot.state.pending_transcript.is_empty());
        assert_eq!(engine.calls(), 1);
        assert_eq!(h.recognizer.listens(), 2);
        assert!(h.recognizer.is_active());
    }

    #[tokio::test]
    async fn test_muted_turn_never_speaks_or_rearms() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            OrchestratorConfig {
                muted: true,
                ..continuous_config()
            },
            MockChatClient::new(vec![reply(&["Rest ", "well."])]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("I have a cold", true);

        let snapshot = wait_until(&h.handle, idle_with(3)).await;
        assert_eq!(snapshot.messages[2].content, "Rest well.");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.handle.snapshot().phase(), Phase::Idle);
        assert_eq!(engine.calls(), 0);
        assert_eq!(h.recognizer.listens(), 1);
    }

    #[tokio::test]
    async fn test_submit_while_thinking_rejected() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![Reply::Hang]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );
        let mut events = h.handle.subscribe();

        h.handle.submit("first").unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Thinking).await;
        h.handle.submit("second").unwrap();

        next_matching(&mut events, |e| matches!(e, ConversationEvent::Rejected { .. })).await;
        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.phase(), Phase::Thinking);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(h.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_final_transcript_ignored() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;

        h.recognizer.say("   ", true);
        h.recognizer.say("still here", false);
        let snapshot = wait_until(&h.handle, |s| s.state.pending_transcript == "still here").await;

        assert_eq!(snapshot.phase(), Phase::Listening);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(h.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_appends_one_message() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            continuous_config(),
            MockChatClient::new(vec![Reply::Status(500)]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );
        let mut events = h.handle.subscribe();

        h.handle.submit("hello").unwrap();
        let snapshot = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(snapshot.messages[2].content, crate::config::DEFAULT_ERROR_MESSAGE);
        let error = next_matching(&mut events, |e| matches!(e, ConversationEvent::Error { .. })).await;
        assert!(matches!(
            error,
            ConversationEvent::Error {
                kind: ErrorKind::ChatTransport,
                ..
            }
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.handle.snapshot().messages.len(), 3);
        assert_eq!(h.client.calls(), 1);
        assert_eq!(engine.calls(), 0);
        assert_eq!(h.recognizer.listens(), 0);
    }

    #[tokio::test]
    async fn test_mid_stream_error_discards_partial_reply() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![Reply::Events(vec![
                ChatEvent::delta("Part"),
                ChatEvent::Error {
                    message: "connection reset".into(),
                },
            ])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        h.handle.submit("hello").unwrap();
        let snapshot = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(snapshot.messages[2].content, crate::config::DEFAULT_ERROR_MESSAGE);
        assert!(snapshot.messages.iter().all(|m| m.content != "Part"));
    }

    #[tokio::test]
    async fn test_fallback_success_is_invisible() {
        let primary = MockEngine::new(Behavior::Fail);
        let fallback = MockEngine::new(Behavior::Succeed);
        let h = start(
            test_config(),
            MockChatClient::new(vec![reply(&["Drink ", "water."])]),
            MockRecognizer::new(true),
            SynthesisController::new(primary.clone()).with_fallback(fallback.clone()),
        );
        let mut events = h.handle.subscribe();

        h.handle.submit("I feel dizzy").unwrap();
        let snapshot = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(snapshot.messages[2].content, "Drink water.");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, ConversationEvent::Error { .. }));
        }
    }

    #[tokio::test]
    async fn test_mute_during_speaking_cancels() {
        let h = start(
            continuous_config(),
            MockChatClient::new(vec![reply(&["A long answer."])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Block)),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("tell me everything", true);

        wait_until(&h.handle, |s| s.phase() == Phase::Speaking).await;
        eventually(|| h.synthesis.is_speaking()).await;
        assert!(!h.recognizer.is_active());

        let mut events = h.handle.subscribe();
        h.handle.set_muted(true).unwrap();

        let end = next_matching(&mut events, |e| matches!(e, ConversationEvent::SpeechEnd { .. })).await;
        assert!(matches!(
            end,
            ConversationEvent::SpeechEnd {
                outcome: SpeakOutcome::Cancelled
            }
        ));
        wait_until(&h.handle, |s| s.phase() == Phase::Idle && s.state.muted).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.handle.snapshot().phase(), Phase::Idle);
        assert_eq!(h.recognizer.listens(), 1);
        assert!(!h.synthesis.is_speaking());
    }

    #[tokio::test]
    async fn test_teardown_during_speaking() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![reply(&["Sure."])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Block)),
        );

        h.handle.submit("hi").unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Speaking).await;
        eventually(|| h.synthesis.is_speaking()).await;

        h.handle.close();
        h.handle.close();
        tokio::time::timeout(WAIT, h.handle.closed()).await.unwrap();
        tokio::time::timeout(WAIT, h.task).await.unwrap().unwrap();

        assert_eq!(h.handle.snapshot().phase(), Phase::Closed);
        assert!(!h.synthesis.is_speaking());
        assert!(!h.recognizer.is_active());
        assert!(matches!(h.handle.submit("again"), Err(Error::Closed)));
        h.handle.close();
    }

    #[tokio::test]
    async fn test_dropping_handles_tears_down() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        assert!(h.recognizer.is_active());

        let Harness {
            handle,
            recognizer,
            task,
            ..
        } = h;
        drop(handle);
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert!(!recognizer.is_active());
    }

    #[tokio::test]
    async fn test_language_change_only_while_idle() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![Reply::Hang]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );
        let mut events = h.handle.subscribe();

        h.handle.set_language(Language::Tamil).unwrap();
        wait_until(&h.handle, |s| s.state.language == Language::Tamil).await;

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        assert_eq!(*h.recognizer.languages.lock(), vec![Language::Tamil]);

        h.handle.submit("vanakkam").unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Thinking).await;
        h.handle.set_language(Language::Hindi).unwrap();

        next_matching(&mut events, |e| matches!(e, ConversationEvent::Rejected { .. })).await;
        assert_eq!(h.handle.snapshot().state.language, Language::Tamil);
    }

    #[tokio::test]
    async fn test_capture_unsupported_is_reported() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![]),
            MockRecognizer::new(false),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );
        let mut events = h.handle.subscribe();

        assert!(!h.handle.snapshot().capture_supported);
        h.handle.start_listening().unwrap();

        let error = next_matching(&mut events, |e| matches!(e, ConversationEvent::Error { .. })).await;
        assert!(matches!(
            error,
            ConversationEvent::Error {
                kind: ErrorKind::Unsupported,
                ..
            }
        ));
        assert_eq!(h.handle.snapshot().phase(), Phase::Idle);
        assert_eq!(h.recognizer.listens(), 0);
    }

    #[tokio::test]
    async fn test_synthesis_unsupported_continues_as_spoken() {
        let h = start(
            continuous_config(),
            MockChatClient::new(vec![reply(&["Text only."])]),
            MockRecognizer::new(true),
            SynthesisController::new(Arc::new(Unavailable)),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("hello", true);

        let snapshot = wait_until(&h.handle, |s| {
            s.phase() == Phase::Listening && s.messages.len() == 3
        })
        .await;
        assert_eq!(snapshot.messages[2].content, "Text only.");
        assert!(!snapshot.synthesis_supported);
        assert_eq!(h.recognizer.listens(), 2);
    }

    #[tokio::test]
    async fn test_manual_stop_cancels_pending_rearm() {
        let h = start(
            OrchestratorConfig {
                settle: SettleDelays {
                    pre_speech: Duration::ZERO,
                    rearm: Duration::from_millis(100),
                },
                ..continuous_config()
            },
            MockChatClient::new(vec![reply(&["Okay."])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("hi", true);
        wait_until(&h.handle, idle_with(3)).await;

        h.handle.stop_listening().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(h.handle.snapshot().phase(), Phase::Idle);
        assert_eq!(h.recognizer.listens(), 1);
    }

    #[tokio::test]
    async fn test_greeting_seeded_and_spoken() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            OrchestratorConfig {
                language: Language::Hindi,
                speak_greeting: true,
                ..test_config()
            },
            MockChatClient::new(vec![]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );

        let expected = greetings::greeting(&ConversationType::PatientAssistant, Language::Hindi);
        assert_eq!(h.handle.snapshot().messages, vec![Message::assistant(expected)]);

        eventually(|| engine.calls() == 1).await;
        wait_until(&h.handle, |s| s.phase() == Phase::Idle && s.version > 1).await;
        assert_eq!(engine.spoken(), vec![expected.to_string()]);
    }

    #[tokio::test]
    async fn test_history_progress_and_versions() {
        let h = start(
            OrchestratorConfig {
                conversation_type: ConversationType::PatientHistory,
                muted: true,
                ..test_config()
            },
            MockChatClient::new(vec![reply(&["How long?"])]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        let before = wait_until(&h.handle, |s| s.version >= 1).await;
        assert_eq!(before.progress, Some(5));

        h.handle.submit("I have a headache").unwrap();
        let after = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(after.progress, Some(15));
        assert!(after.version > before.version);
        assert_eq!(after.conversation_id, before.conversation_id);
    }

    #[tokio::test]
    async fn test_history_progress_counts_error_reply() {
        let h = start(
            OrchestratorConfig {
                conversation_type: ConversationType::PatientHistory,
                ..test_config()
            },
            MockChatClient::new(vec![Reply::Status(503)]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );

        h.handle.submit("my knee hurts").unwrap();
        let snapshot = wait_until(&h.handle, idle_with(3)).await;

        assert_eq!(snapshot.messages[2].content, crate::config::DEFAULT_ERROR_MESSAGE);
        assert_eq!(snapshot.progress, Some(15));
    }

    #[tokio::test]
    async fn test_teardown_during_thinking_abandons_exchange() {
        let h = start(
            test_config(),
            MockChatClient::new(vec![Reply::Hang]),
            MockRecognizer::new(true),
            SynthesisController::new(MockEngine::new(Behavior::Succeed)),
        );
        let mut events = h.handle.subscribe();

        h.handle.submit("is this serious?").unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Thinking).await;

        h.handle.close();
        next_matching(&mut events, |e| e.is_terminal()).await;
        tokio::time::timeout(WAIT, h.task).await.unwrap().unwrap();

        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.phase(), Phase::Closed);
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.messages[1].is_user());
        assert_eq!(snapshot.streaming, None);
        assert_eq!(h.client.calls(), 1);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(
                event,
                ConversationEvent::MessageUpdate { .. } | ConversationEvent::MessageEnd { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_synthesis_failure_reported_then_rearms() {
        let primary = MockEngine::new(Behavior::Fail);
        let fallback = MockEngine::new(Behavior::Fail);
        let h = start(
            continuous_config(),
            MockChatClient::new(vec![reply(&["Ok."])]),
            MockRecognizer::new(true),
            SynthesisController::new(primary.clone()).with_fallback(fallback.clone()),
        );
        let mut events = h.handle.subscribe();

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("thank you", true);

        let error = next_matching(&mut events, |e| matches!(e, ConversationEvent::Error { .. })).await;
        assert!(matches!(
            error,
            ConversationEvent::Error {
                kind: ErrorKind::SynthesisFailure,
                ..
            }
        ));

        let snapshot = wait_until(&h.handle, |s| {
            s.phase() == Phase::Listening && s.messages.len() == 3
        })
        .await;
        assert_eq!(snapshot.messages[1], Message::user("thank you"));
        assert_eq!(snapshot.messages[2], Message::assistant("Ok."));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(h.recognizer.listens(), 2);
    }

    #[tokio::test]
    async fn test_mute_during_pre_speech_delay_skips_utterance() {
        let engine = MockEngine::new(Behavior::Succeed);
        let h = start(
            OrchestratorConfig {
                settle: SettleDelays {
                    pre_speech: Duration::from_millis(200),
                    rearm: Duration::ZERO,
                },
                ..continuous_config()
            },
            MockChatClient::new(vec![reply(&["Take rest."])]),
            MockRecognizer::new(true),
            SynthesisController::new(engine.clone()),
        );

        h.handle.start_listening().unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Listening).await;
        h.recognizer.say("I feel tired", true);

        wait_until(&h.handle, |s| s.phase() == Phase::Speaking).await;
        h.handle.set_muted(true).unwrap();
        wait_until(&h.handle, |s| s.phase() == Phase::Idle && s.state.muted).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.phase(), Phase::Idle);
        assert_eq!(snapshot.messages[2].content, "Take rest.");
        assert_eq!(engine.calls(), 0);
        assert_eq!(h.recognizer.listens(), 1);
        assert!(!h.synthesis.is_speaking());
    }
}
