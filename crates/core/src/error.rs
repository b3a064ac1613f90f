/// The four failure kinds the console distinguishes.
///
/// None of them is fatal: each is rendered to a string and appended to the
/// [`ErrorLog`](crate::error_log::ErrorLog) where it happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("robot backend unreachable: {0}")]
    BackendUnreachable(String),
    #[error("voice session error: {0}")]
    VoiceSession(String),
    #[error("audio playback error: {0}")]
    AudioPlayback(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
