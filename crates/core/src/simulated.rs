use crate::robot::{RobotPosition, StopId};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Sleep;

/// Fixed latency between a simulated move command and arrival.
pub const SIMULATED_MOVE_DELAY: Duration = Duration::from_millis(1200);

/// The stops visited while the real backend is unavailable, in tour order.
pub const SIMULATED_STOPS: &[(StopId, &str)] = &[(1, "Base 1"), (2, "Base 2"), (3, "Base 3")];

/// Local stand-in for the robot backend.
///
/// Reads are synchronous. A move marks the current stop as moving and arms a
/// single timer; [`arrived`](Self::arrived) resolves once that timer fires and
/// the cursor has moved on (circularly). The timer lives inside the driver,
/// so dropping or [`cancel`](Self::cancel)ling it leaves nothing running.
#[derive(Debug)]
pub struct SimulatedRobot {
    cursor: usize,
    moving: bool,
    delay: Duration,
    pending: Option<Pin<Box<Sleep>>>,
}

impl SimulatedRobot {
    pub fn new() -> Self {
        Self::with_delay(SIMULATED_MOVE_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            cursor: 0,
            moving: false,
            delay,
            pending: None,
        }
    }

    /// The stop under the cursor, never moving.
    ///
    /// With `reset_cursor` the driver starts over from the first stop and any
    /// pending arrival is dropped.
    pub fn current_position(&mut self, reset_cursor: bool) -> RobotPosition {
        if reset_cursor {
            self.cancel();
            self.cursor = 0;
        }
        self.stop_at(false)
    }

    /// Current position including the moving flag.
    pub fn position(&self) -> RobotPosition {
        self.stop_at(self.moving)
    }

    /// Start a move. Calling it again before arrival does not re-arm the timer.
    pub fn advance(&mut self) -> RobotPosition {
        if self.pending.is_none() {
            self.moving = true;
            self.pending = Some(Box::pin(tokio::time::sleep(self.delay)));
            tracing::debug!("simulated move from stop {}", self.position().position);
        }
        self.position()
    }

    pub fn is_advancing(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolves with the new stop once a pending move completes.
    ///
    /// Pending forever when no move is in flight. Cancel-safe: dropping the
    /// future keeps the move armed.
    pub async fn arrived(&mut self) -> RobotPosition {
        match self.pending.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending::<()>().await,
        }
        self.pending = None;
        self.cursor = (self.cursor + 1) % SIMULATED_STOPS.len();
        self.moving = false;
        self.position()
    }

    /// Drop any pending move; the cursor stays where it is.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.moving = false;
    }

    /// Align the cursor with a known stop. Returns false for unknown ids.
    pub fn sync_to(&mut self, stop: StopId) -> bool {
        match SIMULATED_STOPS.iter().position(|(id, _)| *id == stop) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    fn stop_at(&self, is_moving: bool) -> RobotPosition {
        let (position, name) = SIMULATED_STOPS[self.cursor];
        RobotPosition {
            position,
            position_name: name.to_string(),
            is_moving,
        }
    }
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}
