use crate::Command;
use crate::audio::{AudioEvent, AudioPlayer};
use crate::error::ConsoleError;
use crate::error_log::ErrorLog;
use crate::events::{ConnectivityState, ConversationState, EventNormalizer, Signal};
use crate::robot::{RobotApi, RobotPosition, StopId};
use crate::tour::{TourSequencer, TourState};
use crate::transcript::TRANSCRIPT_CLEAR_INTERVAL;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

/// Capacity of the normalized signal channel.
pub const SIGNAL_CAPACITY: usize = 256;

/// Everything the operator sees, published after every step of the loop.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ConsoleSnapshot {
    pub tour_state: TourState,
    pub simulation_mode: bool,
    pub current_stop: Option<StopId>,
    pub last_position: Option<RobotPosition>,
    pub connectivity: ConnectivityState,
    pub conversation: ConversationState,
    pub user_speaking: bool,
    pub mic_enabled: bool,
    pub user_transcript: String,
    pub bot_transcript: String,
    pub errors: Vec<String>,
    /// Errors appended since startup, including rotated or cleared ones.
    pub errors_logged: u64,
}

/// The console's single event loop.
///
/// Operator commands, session signals, audio completions, sequencer timers
/// and the transcript-clear tick are handled one at a time, so no two
/// transitions ever interleave.
pub struct Console<R, A> {
    sequencer: TourSequencer<R, A>,
    normalizer: EventNormalizer,
    signals: broadcast::Receiver<Signal>,
    errors: ErrorLog,
    conversation: ConversationState,
    user_speaking: bool,
    snapshot: watch::Sender<ConsoleSnapshot>,
}

impl<R: RobotApi, A: AudioPlayer> Console<R, A> {
    /// Subscribes to the sequencer's voice session. Must be called from
    /// within a tokio runtime.
    pub fn new(sequencer: TourSequencer<R, A>, errors: ErrorLog) -> Self {
        let events = sequencer.session().session().subscribe();
        let normalizer = EventNormalizer::spawn(events, SIGNAL_CAPACITY);
        let signals = normalizer.subscribe();
        let (snapshot, _) = watch::channel(ConsoleSnapshot::default());
        let console = Self {
            sequencer,
            normalizer,
            signals,
            errors,
            conversation: ConversationState::Idle,
            user_speaking: false,
            snapshot,
        };
        console.publish();
        console
    }

    pub fn snapshots(&self) -> watch::Receiver<ConsoleSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn sequencer(&self) -> &TourSequencer<R, A> {
        &self.sequencer
    }

    pub async fn handle(&mut self, command: Command) {
        tracing::debug!("command: {:?}", command);
        match command {
            Command::Start => self.sequencer.start().await,
            Command::Stop => self.sequencer.stop(),
            Command::NextBase => self.sequencer.move_to_next_base().await,
            Command::AskQuestions => self.sequencer.ask_questions().await,
            Command::FinishQuestions => self.sequencer.finish_questions_and_move().await,
            Command::ReplayAudio => self.sequencer.replay_audio().await,
            Command::SetSimulation(enabled) => self.sequencer.set_simulation_mode(enabled).await,
            Command::Connect => {
                // Failures are already in the error log.
                let _ = self.sequencer.session().connect().await;
            }
            Command::Disconnect => self.sequencer.session().disconnect().await,
            Command::ToggleMic => {
                if let Some(enabled) = self.sequencer.session().toggle_mic() {
                    tracing::info!("microphone {}", if enabled { "on" } else { "off" });
                }
            }
            Command::ClearTranscripts => self.sequencer.transcripts_mut().clear(),
            Command::ClearErrors => self.errors.clear(),
        }
    }

    pub fn on_signal(&mut self, signal: Signal) {
        self.conversation = self.conversation.on_signal(&signal);
        match signal {
            Signal::TransportChanged(raw) => self.sequencer.session().on_transport(&raw),
            Signal::UserSpeechStarted => self.user_speaking = true,
            Signal::UserSpeechStopped => self.user_speaking = false,
            Signal::BotSpeechStarted | Signal::BotSpeechStopped => {}
            Signal::UserTranscript { text, is_final } => {
                self.sequencer.transcripts_mut().append_user(&text, is_final)
            }
            Signal::BotTranscript(text) => self.sequencer.transcripts_mut().append_bot(&text),
            Signal::ErrorOccurred(message) => {
                self.user_speaking = false;
                self.errors.push(ConsoleError::VoiceSession(message).to_string());
            }
        }
    }

    /// Run until the command channel closes, then stop the tour and drop the
    /// session subscription.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut audio: mpsc::Receiver<AudioEvent>,
    ) {
        let mut clear = tokio::time::interval_at(
            Instant::now() + TRANSCRIPT_CLEAR_INTERVAL,
            TRANSCRIPT_CLEAR_INTERVAL,
        );
        let mut signals_open = true;
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                signal = self.signals.recv(), if signals_open => match signal {
                    Ok(signal) => self.on_signal(signal),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("console lagged, skipped {} signals", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => signals_open = false,
                },
                Some(event) = audio.recv() => self.sequencer.on_audio_event(event),
                timer = self.sequencer.next_timer() => self.sequencer.on_timer(timer).await,
                _ = clear.tick() => {
                    tracing::debug!("clearing transcripts");
                    self.sequencer.transcripts_mut().clear();
                }
            }
            self.publish();
        }

        self.shutdown();
    }

    /// Stop the tour, cancelling every timer, and unsubscribe from the session.
    pub fn shutdown(&mut self) {
        self.sequencer.stop();
        self.normalizer.shutdown();
        self.publish();
        tracing::info!("console stopped");
    }

    fn publish(&self) {
        let transcripts = self.sequencer.transcripts();
        let session = self.sequencer.session();
        let (errors, errors_logged) = self.errors.snapshot();
        let next = ConsoleSnapshot {
            tour_state: self.sequencer.state(),
            simulation_mode: self.sequencer.simulation_mode(),
            current_stop: self.sequencer.current_stop(),
            last_position: self.sequencer.last_position().cloned(),
            connectivity: session.connectivity(),
            conversation: self.conversation,
            user_speaking: self.user_speaking,
            mic_enabled: session.mic_enabled(),
            user_transcript: transcripts.user().to_string(),
            bot_transcript: transcripts.bot().to_string(),
            errors,
            errors_logged,
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
