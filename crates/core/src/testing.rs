//! Scripted stand-ins for the robot backend, the audio player and the voice
//! session. Each clone shares its state with the original so tests can
//! inspect what the code under test did.

use crate::audio::{AudioPlayer, PlaybackId};
use crate::error::{ConsoleError, Result};
use crate::robot::{RobotApi, RobotPosition, StopId};
use crate::session::{ConnectParams, VoiceSession};
use async_trait::async_trait;
use rtvi_types::SessionEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub fn at(stop: StopId, is_moving: bool) -> RobotPosition {
    RobotPosition {
        position: stop,
        position_name: format!("Base {stop}"),
        is_moving,
    }
}

pub fn offline() -> ConsoleError {
    ConsoleError::BackendUnreachable("HTTP 503 from robot".to_string())
}

#[derive(Default)]
struct RobotScript {
    positions: VecDeque<Result<RobotPosition>>,
    moves: VecDeque<Result<()>>,
    fetches: usize,
    move_calls: usize,
}

/// Replays queued responses; an exhausted position queue means the backend
/// is down.
#[derive(Clone, Default)]
pub struct FakeRobot(Arc<Mutex<RobotScript>>);

impl FakeRobot {
    pub fn position(self, position: Result<RobotPosition>) -> Self {
        self.0.lock().unwrap().positions.push_back(position);
        self
    }

    pub fn moves(self, result: Result<()>) -> Self {
        self.0.lock().unwrap().moves.push_back(result);
        self
    }

    pub fn fetches(&self) -> usize {
        self.0.lock().unwrap().fetches
    }

    pub fn move_calls(&self) -> usize {
        self.0.lock().unwrap().move_calls
    }
}

#[async_trait]
impl RobotApi for FakeRobot {
    async fn fetch_position(&self) -> Result<RobotPosition> {
        let mut script = self.0.lock().unwrap();
        script.fetches += 1;
        script.positions.pop_front().unwrap_or_else(|| Err(offline()))
    }

    async fn move_position(&self) -> Result<()> {
        let mut script = self.0.lock().unwrap();
        script.move_calls += 1;
        script.moves.pop_front().unwrap_or(Ok(()))
    }
}

#[derive(Default)]
struct PlayerLog {
    played: Vec<String>,
    stops: usize,
    last: PlaybackId,
}

#[derive(Clone, Default)]
pub struct FakePlayer(Arc<Mutex<PlayerLog>>);

impl FakePlayer {
    pub fn played(&self) -> Vec<String> {
        self.0.lock().unwrap().played.clone()
    }

    pub fn stops(&self) -> usize {
        self.0.lock().unwrap().stops
    }

    /// Id handed out by the most recent `play`.
    pub fn last(&self) -> PlaybackId {
        self.0.lock().unwrap().last
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play(&mut self, asset: &str) -> Result<PlaybackId> {
        let mut log = self.0.lock().unwrap();
        log.last = log.last.next();
        log.played.push(asset.to_string());
        Ok(log.last)
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().stops += 1;
    }
}

/// A session whose raw events are injected by the test.
pub struct FakeSession {
    pub events: broadcast::Sender<SessionEvent>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
    mic: AtomicBool,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: broadcast::channel(64).0,
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            mic: AtomicBool::new(false),
        })
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn connect(&self, _params: &ConnectParams) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ConsoleError::VoiceSession("connection refused".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn enable_mic(&self, enabled: bool) {
        self.mic.store(enabled, Ordering::SeqCst);
    }

    fn mic_enabled(&self) -> bool {
        self.mic.load(Ordering::SeqCst)
    }
}
