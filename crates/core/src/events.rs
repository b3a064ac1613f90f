use rtvi_types::{EventKind, SessionEvent};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Raw transport states as reported by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Ready,
    Disconnected,
    Failed,
    Closed,
    Other(String),
}

impl TransportState {
    pub fn parse(state: &str) -> Self {
        match state {
            "connecting" => TransportState::Connecting,
            "connected" => TransportState::Connected,
            "ready" => TransportState::Ready,
            "disconnected" => TransportState::Disconnected,
            "failed" => TransportState::Failed,
            "closed" => TransportState::Closed,
            other => TransportState::Other(other.to_string()),
        }
    }

    /// The coarse state this raw state collapses into, if any.
    pub fn connectivity(&self) -> Option<ConnectivityState> {
        match self {
            TransportState::Connecting => Some(ConnectivityState::Connecting),
            TransportState::Connected | TransportState::Ready => Some(ConnectivityState::Connected),
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed => {
                Some(ConnectivityState::Disconnected)
            }
            TransportState::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectivityState {
    /// Unrecognized raw states leave the current state untouched.
    pub fn apply(self, raw: &TransportState) -> Self {
        raw.connectivity().unwrap_or(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display-only conversation state derived from speech activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Responding,
}

impl ConversationState {
    pub fn on_signal(self, signal: &Signal) -> Self {
        match signal {
            Signal::UserSpeechStarted => ConversationState::Listening,
            Signal::UserSpeechStopped => ConversationState::Thinking,
            Signal::BotSpeechStarted => ConversationState::Responding,
            Signal::BotSpeechStopped => ConversationState::Listening,
            Signal::ErrorOccurred(_) => ConversationState::Idle,
            _ => self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Listening => "listening",
            ConversationState::Thinking => "thinking",
            ConversationState::Responding => "responding",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, UI-stable signals produced from raw session events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    TransportChanged(TransportState),
    UserSpeechStarted,
    UserSpeechStopped,
    BotSpeechStarted,
    BotSpeechStopped,
    UserTranscript { text: String, is_final: bool },
    BotTranscript(String),
    ErrorOccurred(String),
}

type Decoder = fn(&Value) -> Option<Signal>;

/// One decoder per subscribed event kind.
///
/// A decoder returns `None` when a required field is absent; the event is
/// then dropped.
pub const EVENT_MAP: &[(EventKind, Decoder)] = &[
    (EventKind::TransportStateChanged, decode_transport),
    (EventKind::SessionStateChanged, ignore),
    (EventKind::UserTranscript, decode_user_transcript),
    (EventKind::BotTranscript, decode_bot_transcript),
    (EventKind::UserStartedSpeaking, user_started),
    (EventKind::UserStoppedSpeaking, user_stopped),
    (EventKind::BotStartedSpeaking, bot_started),
    (EventKind::BotStoppedSpeaking, bot_stopped),
    (EventKind::Error, decode_error),
    (EventKind::Connected, connected),
    (EventKind::Disconnected, disconnected),
];

fn ignore(_: &Value) -> Option<Signal> {
    None
}

fn user_started(_: &Value) -> Option<Signal> {
    Some(Signal::UserSpeechStarted)
}

fn user_stopped(_: &Value) -> Option<Signal> {
    Some(Signal::UserSpeechStopped)
}

fn bot_started(_: &Value) -> Option<Signal> {
    Some(Signal::BotSpeechStarted)
}

fn bot_stopped(_: &Value) -> Option<Signal> {
    Some(Signal::BotSpeechStopped)
}

fn connected(_: &Value) -> Option<Signal> {
    Some(Signal::TransportChanged(TransportState::Connected))
}

fn disconnected(_: &Value) -> Option<Signal> {
    Some(Signal::TransportChanged(TransportState::Disconnected))
}

fn non_empty_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

// Accepts both a bare `"connected"` payload and `{ "state": "connected" }`.
fn decode_transport(payload: &Value) -> Option<Signal> {
    let state = match payload {
        Value::String(state) => state.as_str(),
        other => other.get("state")?.as_str()?,
    };
    Some(Signal::TransportChanged(TransportState::parse(state)))
}

fn decode_user_transcript(payload: &Value) -> Option<Signal> {
    let text = non_empty_str(payload, "text")?;
    let is_final = payload
        .get("final")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(Signal::UserTranscript {
        text: text.to_string(),
        is_final,
    })
}

fn decode_bot_transcript(payload: &Value) -> Option<Signal> {
    non_empty_str(payload, "text").map(|text| Signal::BotTranscript(text.to_string()))
}

fn decode_error(payload: &Value) -> Option<Signal> {
    let message = non_empty_str(payload, "message")
        .or_else(|| non_empty_str(payload, "error"))
        .map(str::to_string)
        .or_else(|| (!payload.is_null()).then(|| payload.to_string()))
        .unwrap_or_else(|| "unknown error".to_string());
    Some(Signal::ErrorOccurred(message))
}

/// Decode a single raw event. Never panics on malformed payloads.
pub fn normalize(event: &SessionEvent) -> Option<Signal> {
    let (_, decode) = EVENT_MAP.iter().find(|(kind, _)| *kind == event.kind())?;
    let signal = decode(event.data());
    if signal.is_none() {
        tracing::debug!(
            "dropping {} event without usable payload: {}",
            event.kind().as_str(),
            event.data()
        );
    }
    signal
}

/// Owns the subscription to a session's raw event stream and re-publishes
/// normalized [`Signal`]s to any number of subscribers.
///
/// Dropping the normalizer (or calling [`shutdown`](Self::shutdown)) ends the
/// subscription.
pub struct EventNormalizer {
    s_tx: broadcast::Sender<Signal>,
    task: Option<JoinHandle<()>>,
}

impl EventNormalizer {
    pub fn spawn(mut events: broadcast::Receiver<SessionEvent>, capacity: usize) -> Self {
        let (s_tx, _) = broadcast::channel(capacity);
        let tx = s_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!("session event: {} {}", event.kind().as_str(), event.data());
                        if let Some(signal) = normalize(&event) {
                            // Zero subscribers is not an error.
                            let _ = tx.send(signal);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("event normalizer lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("session event stream ended");
        });
        Self {
            s_tx,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.s_tx.subscribe()
    }

    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for EventNormalizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
