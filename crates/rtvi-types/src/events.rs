use serde_json::Value;

/// Client-side event kinds emitted by a real-time session.
///
/// The serialized names match the event names a browser RTVI client exposes,
/// so a recorded event log can be replayed as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    TransportStateChanged,
    SessionStateChanged,
    UserTranscript,
    BotTranscript,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    BotStartedSpeaking,
    BotStoppedSpeaking,
    Error,
    Connected,
    Disconnected,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::TransportStateChanged,
        EventKind::SessionStateChanged,
        EventKind::UserTranscript,
        EventKind::BotTranscript,
        EventKind::UserStartedSpeaking,
        EventKind::UserStoppedSpeaking,
        EventKind::BotStartedSpeaking,
        EventKind::BotStoppedSpeaking,
        EventKind::Error,
        EventKind::Connected,
        EventKind::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TransportStateChanged => "transportStateChanged",
            EventKind::SessionStateChanged => "sessionStateChanged",
            EventKind::UserTranscript => "userTranscript",
            EventKind::BotTranscript => "botTranscript",
            EventKind::UserStartedSpeaking => "userStartedSpeaking",
            EventKind::UserStoppedSpeaking => "userStoppedSpeaking",
            EventKind::BotStartedSpeaking => "botStartedSpeaking",
            EventKind::BotStoppedSpeaking => "botStoppedSpeaking",
            EventKind::Error => "error",
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
        }
    }
}

/// A raw session event: the kind plus whatever payload the transport attached.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionEvent {
    kind: EventKind,
    #[serde(default)]
    data: Value,
}

impl SessionEvent {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// An event with no payload.
    pub fn bare(kind: EventKind) -> Self {
        Self {
            kind,
            data: Value::Null,
        }
    }

    /// A `transportStateChanged` event carrying `{ "state": <state> }`.
    pub fn transport(state: &str) -> Self {
        Self {
            kind: EventKind::TransportStateChanged,
            data: serde_json::json!({ "state": state }),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}
