//! Events exchanged with the relay over the transport channel.
//!
//! On the wire each event is a JSON object naming the event and carrying
//! its payload:
//!
//! ```json
//! { "event": "room:join", "data": "alice|bob" }
//! { "event": "typing", "data": { "room": "alice|bob", "from": "alice" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::chat::protocol::envelope::MessageEnvelope;

/// A user came online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceOnline {
    pub user: String,
}

/// A user's online state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user: String,
    pub online: bool,
}

/// Someone is typing in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    pub room: String,
    pub from: String,
}

/// A transport event, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TransportEvent {
    /// Client asks to join a room.
    #[serde(rename = "room:join")]
    RoomJoin(String),

    /// Client sends a message to its room.
    #[serde(rename = "chat:send")]
    ChatSend(MessageEnvelope),

    /// Relay delivers a message.
    #[serde(rename = "chat:recv")]
    ChatRecv(MessageEnvelope),

    #[serde(rename = "presence:online")]
    PresenceOnline(PresenceOnline),

    #[serde(rename = "presence:update")]
    PresenceUpdate(PresenceUpdate),

    #[serde(rename = "typing")]
    Typing(TypingNotice),
}

impl TransportEvent {
    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoin(_) => "room:join",
            Self::ChatSend(_) => "chat:send",
            Self::ChatRecv(_) => "chat:recv",
            Self::PresenceOnline(_) => "presence:online",
            Self::PresenceUpdate(_) => "presence:update",
            Self::Typing(_) => "typing",
        }
    }

    /// Serialize to bytes for transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
