use crate::events::{EventKind, SessionEvent};
use serde_json::Value;

/// Label carried by every RTVI protocol message.
pub const RTVI_LABEL: &str = "rtvi-ai";

/// Protocol version announced in `client-ready`.
pub const RTVI_VERSION: &str = "1.0.0";

/// RTVI message types this console sends or understands.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    ClientReady,
    DisconnectBot,
    BotReady,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    BotStartedSpeaking,
    BotStoppedSpeaking,
    UserTranscription,
    BotTranscription,
    Error,
    ErrorResponse,
    #[serde(other)]
    Other,
}

/// The RTVI envelope: `{ "label": "rtvi-ai", "type": ..., "id": ..., "data": ... }`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RtviMessage {
    label: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    data: Value,
}

impl RtviMessage {
    pub fn new(message_type: MessageType, data: Value) -> Self {
        Self {
            label: RTVI_LABEL.to_string(),
            message_type,
            id: None,
            data,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn client_ready() -> Self {
        Self::new(
            MessageType::ClientReady,
            serde_json::json!({ "version": RTVI_VERSION }),
        )
    }

    pub fn disconnect_bot() -> Self {
        Self::new(MessageType::DisconnectBot, Value::Null)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Maps an incoming protocol message onto the session event it represents.
    ///
    /// Returns `None` for messages that carry no client-visible event
    /// (foreign labels, client-bound control types, unknown types).
    pub fn into_session_event(self) -> Option<SessionEvent> {
        if self.label != RTVI_LABEL {
            return None;
        }
        let kind = match self.message_type {
            MessageType::BotReady => return Some(SessionEvent::transport("ready")),
            MessageType::UserStartedSpeaking => EventKind::UserStartedSpeaking,
            MessageType::UserStoppedSpeaking => EventKind::UserStoppedSpeaking,
            MessageType::BotStartedSpeaking => EventKind::BotStartedSpeaking,
            MessageType::BotStoppedSpeaking => EventKind::BotStoppedSpeaking,
            MessageType::UserTranscription => EventKind::UserTranscript,
            MessageType::BotTranscription => EventKind::BotTranscript,
            MessageType::Error | MessageType::ErrorResponse => EventKind::Error,
            MessageType::ClientReady | MessageType::DisconnectBot | MessageType::Other => {
                return None;
            }
        };
        Some(SessionEvent::new(kind, self.data))
    }
}
