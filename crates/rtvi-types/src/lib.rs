pub mod events;
pub mod message;

pub use events::{EventKind, SessionEvent};
pub use message::{MessageType, RtviMessage, RTVI_LABEL, RTVI_VERSION};
