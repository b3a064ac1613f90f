pub mod audio;
pub mod console;
pub mod error;
pub mod error_log;
pub mod events;
pub mod robot;
pub mod session;
pub mod simulated;
pub mod telemetry;
pub mod tour;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use console::{Console, ConsoleSnapshot};
pub use error::{ConsoleError, Result};
pub use error_log::ErrorLog;

/// Represents the actions an operator can issue to the [`Console`].
///
/// This enum is the primary API between whatever front end drives the console
/// (an interactive prompt, a test) and the tour logic. Actions that make no
/// sense in the current state are logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin a tour at the robot's current stop.
    Start,
    /// Abort the tour from any state.
    Stop,
    /// Leave the current stop for the next one.
    NextBase,
    /// Open the voice session for visitor questions.
    AskQuestions,
    /// Close the voice session and move on.
    FinishQuestions,
    ReplayAudio,
    /// Switch simulation mode on or off.
    SetSimulation(bool),
    Connect,
    Disconnect,
    ToggleMic,
    ClearTranscripts,
    ClearErrors,
}
