use crate::audio::{AudioAssets, AudioEvent, AudioPlayer, PlaybackId};
use crate::error::ConsoleError;
use crate::error_log::ErrorLog;
use crate::robot::{RobotApi, RobotPosition, StopId};
use crate::session::SessionManager;
use crate::simulated::SimulatedRobot;
use crate::transcript::Transcripts;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Position is re-checked on this cadence while the robot moves.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Consecutive `is_moving` reports tolerated before a move is abandoned.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TourState {
    #[default]
    Idle,
    PlayingAudio,
    WaitingForAction,
    Moving,
    AskingQuestions,
}

impl TourState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourState::Idle => "idle",
            TourState::PlayingAudio => "playing-audio",
            TourState::WaitingForAction => "waiting-for-action",
            TourState::Moving => "moving",
            TourState::AskingQuestions => "asking-questions",
        }
    }
}

impl std::fmt::Display for TourState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timer owned by the sequencer that has fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timer {
    /// Time to check the real robot's position again.
    Poll,
    /// The simulated robot reached its next stop.
    Arrived(RobotPosition),
}

/// Drives a tour: position lookup, per-stop audio, moves and questions.
///
/// All timers (the movement poll and the simulated arrival) live inside the
/// sequencer and are surfaced through [`next_timer`](Self::next_timer), so
/// [`stop`](Self::stop) cancels everything by dropping them.
pub struct TourSequencer<R, A> {
    robot: R,
    audio: A,
    simulated: SimulatedRobot,
    session: Arc<SessionManager>,
    transcripts: Transcripts,
    errors: ErrorLog,
    assets: AudioAssets,
    state: TourState,
    simulation_mode: bool,
    current_stop: Option<StopId>,
    last_position: Option<RobotPosition>,
    playback: Option<PlaybackId>,
    poll: Option<Interval>,
    poll_attempts: u32,
    max_poll_attempts: u32,
}

impl<R: RobotApi, A: AudioPlayer> TourSequencer<R, A> {
    pub fn new(robot: R, audio: A, session: Arc<SessionManager>, errors: ErrorLog) -> Self {
        Self {
            robot,
            audio,
            simulated: SimulatedRobot::new(),
            session,
            transcripts: Transcripts::new(),
            errors,
            assets: AudioAssets::default(),
            state: TourState::Idle,
            simulation_mode: false,
            current_stop: None,
            last_position: None,
            playback: None,
            poll: None,
            poll_attempts: 0,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_assets(mut self, assets: AudioAssets) -> Self {
        self.assets = assets;
        self
    }

    /// `0` polls until the robot stops or the tour is stopped.
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn with_simulation_mode(mut self, enabled: bool) -> Self {
        self.simulation_mode = enabled;
        self
    }

    pub fn state(&self) -> TourState {
        self.state
    }

    pub fn simulation_mode(&self) -> bool {
        self.simulation_mode
    }

    pub fn current_stop(&self) -> Option<StopId> {
        self.current_stop
    }

    pub fn last_position(&self) -> Option<&RobotPosition> {
        self.last_position.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    pub fn transcripts(&self) -> &Transcripts {
        &self.transcripts
    }

    pub fn transcripts_mut(&mut self) -> &mut Transcripts {
        &mut self.transcripts
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Begin a tour at the robot's current stop.
    pub async fn start(&mut self) {
        if self.state != TourState::Idle {
            tracing::warn!("start ignored while {:?}", self.state);
            return;
        }
        tracing::info!("starting tour");
        self.transcripts.clear();
        let position = self.current_position(true).await;
        self.arrive(position).await;
    }

    pub async fn move_to_next_base(&mut self) {
        if self.state != TourState::WaitingForAction {
            tracing::warn!("move ignored while {:?}", self.state);
            return;
        }
        self.begin_move().await;
    }

    /// Open the voice session and hand the microphone to the visitors.
    ///
    /// If the session cannot connect the tour stays where it is and the
    /// action can be retried.
    pub async fn ask_questions(&mut self) {
        if self.state != TourState::WaitingForAction {
            tracing::warn!("questions ignored while {:?}", self.state);
            return;
        }
        if self.session.connect().await.is_err() {
            return;
        }
        self.session.enable_mic(true);
        self.set_state(TourState::AskingQuestions);
    }

    pub async fn finish_questions_and_move(&mut self) {
        if self.state != TourState::AskingQuestions {
            tracing::warn!("finish ignored while {:?}", self.state);
            return;
        }
        self.session.enable_mic(false);
        self.session.disconnect().await;
        self.begin_move().await;
    }

    /// Play the current stop's audio again from the start.
    pub async fn replay_audio(&mut self) {
        match self.state {
            TourState::PlayingAudio | TourState::WaitingForAction => self.play_current().await,
            state => tracing::warn!("replay ignored while {:?}", state),
        }
    }

    /// Abort from any state. Cancels polling, the simulated move and audio.
    pub fn stop(&mut self) {
        self.stop_polling();
        self.simulated.cancel();
        self.audio.stop();
        self.playback = None;
        if self.state != TourState::Idle {
            tracing::info!("tour stopped");
        }
        self.set_state(TourState::Idle);
    }

    pub fn on_audio_event(&mut self, event: AudioEvent) {
        if self.playback != Some(event.id()) {
            tracing::debug!("ignoring stale audio event {:?}", event);
            return;
        }
        self.playback = None;
        if let AudioEvent::Failed(_, reason) = event {
            self.errors.push(ConsoleError::AudioPlayback(reason).to_string());
        }
        if self.state == TourState::PlayingAudio {
            self.set_state(TourState::WaitingForAction);
        }
    }

    /// Switch between the real backend and the simulated robot.
    ///
    /// Leaving simulation requires a successful position fetch; otherwise
    /// the mode is kept and the failure logged. A move already in flight
    /// finishes the way it started.
    pub async fn set_simulation_mode(&mut self, enabled: bool) {
        if enabled == self.simulation_mode {
            return;
        }
        if enabled {
            self.simulation_mode = true;
            self.sync_simulated();
            tracing::info!("simulation mode enabled");
            return;
        }
        match self.robot.fetch_position().await {
            Ok(position) => {
                tracing::info!(
                    "simulation mode disabled, robot at stop {}",
                    position.position
                );
                self.simulation_mode = false;
                self.last_position = Some(position);
            }
            Err(e) => {
                self.errors
                    .push(format!("{e}; staying in simulation mode"));
            }
        }
    }

    /// Resolves when one of the sequencer's timers fires. Pending forever
    /// when none is armed, and safe to drop at any point.
    pub async fn next_timer(&mut self) -> Timer {
        let poll = &mut self.poll;
        let simulated = &mut self.simulated;
        tokio::select! {
            _ = async {
                match poll.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => Timer::Poll,
            position = simulated.arrived() => Timer::Arrived(position),
        }
    }

    pub async fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Poll => self.poll_position().await,
            Timer::Arrived(position) => {
                if self.state == TourState::Moving {
                    self.arrive(position).await;
                } else {
                    tracing::debug!("ignoring simulated arrival while {:?}", self.state);
                }
            }
        }
    }

    fn set_state(&mut self, state: TourState) {
        if self.state != state {
            tracing::info!("tour state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    async fn current_position(&mut self, reset_cursor: bool) -> RobotPosition {
        if !self.simulation_mode {
            match self.robot.fetch_position().await {
                Ok(position) => return position,
                Err(e) => self.enter_fallback(e),
            }
        }
        self.simulated.current_position(reset_cursor)
    }

    fn enter_fallback(&mut self, error: ConsoleError) {
        self.errors.push(error.to_string());
        if !self.simulation_mode {
            tracing::warn!("robot backend unavailable, switching to simulation mode");
            self.simulation_mode = true;
        }
        self.sync_simulated();
    }

    fn sync_simulated(&mut self) {
        if let Some(position) = &self.last_position {
            self.simulated.sync_to(position.position);
        }
    }

    async fn begin_move(&mut self) {
        self.audio.stop();
        self.playback = None;
        self.set_state(TourState::Moving);

        if self.simulation_mode {
            self.simulated.advance();
            return;
        }
        match self.robot.move_position().await {
            Ok(()) => {
                let mut interval =
                    tokio::time::interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poll = Some(interval);
                self.poll_attempts = 0;
            }
            Err(e) => {
                self.enter_fallback(e);
                self.simulated.advance();
            }
        }
    }

    async fn poll_position(&mut self) {
        if self.state != TourState::Moving {
            self.stop_polling();
            return;
        }
        match self.robot.fetch_position().await {
            Ok(position) if !position.is_moving => self.arrive(position).await,
            Ok(position) => {
                self.last_position = Some(position);
                self.poll_attempts += 1;
                if self.max_poll_attempts > 0 && self.poll_attempts >= self.max_poll_attempts {
                    self.stop_polling();
                    self.errors.push(format!(
                        "robot still moving after {} position checks, giving up",
                        self.poll_attempts
                    ));
                    self.set_state(TourState::WaitingForAction);
                }
            }
            Err(e) => {
                self.stop_polling();
                self.enter_fallback(e);
                self.simulated.advance();
            }
        }
    }

    fn stop_polling(&mut self) {
        self.poll = None;
        self.poll_attempts = 0;
    }

    async fn arrive(&mut self, position: RobotPosition) {
        self.stop_polling();
        tracing::info!(
            "at stop {} ({})",
            position.position,
            position.position_name
        );
        self.current_stop = Some(position.position);
        self.last_position = Some(position);
        self.play_current().await;
    }

    async fn play_current(&mut self) {
        let Some(stop) = self.current_stop else {
            return;
        };
        self.audio.stop();
        self.playback = None;

        let Some(asset) = self.assets.asset_for(stop).map(str::to_string) else {
            self.errors.push(
                ConsoleError::AudioPlayback(format!("no audio asset for stop {stop}")).to_string(),
            );
            self.set_state(TourState::WaitingForAction);
            return;
        };

        self.set_state(TourState::PlayingAudio);
        match self.audio.play(&asset).await {
            Ok(id) => self.playback = Some(id),
            Err(e) => {
                self.errors.push(e.to_string());
                self.set_state(TourState::WaitingForAction);
            }
        }
    }
}
