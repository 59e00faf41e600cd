//! Typed realtime events decoded from (topic, payload) pairs
//!
//! Every inbound transport message is turned into exactly one [`DecodedEvent`].
//! The variant always matches the [`EventKind`] the topic was classified as.

use serde::{Deserialize, Serialize};

/// Event category determined purely from the topic shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// New chat comment: `{ns}/c`
    Comment,
    /// Typing indicator: `r/{roomId}/{a}/{b}/t`
    Typing,
    /// Presence change: `u/{email}/s`
    Online,
    /// Read receipt: `r/{roomId}/{a}/{b}/r`
    Read,
    /// Delivery receipt: `r/{roomId}/{a}/{b}/d`
    Delivery,
    /// Topic shape not recognized
    Undefined,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventKind::Comment => "comment",
            EventKind::Typing => "typing",
            EventKind::Online => "online",
            EventKind::Read => "read",
            EventKind::Delivery => "delivery",
            EventKind::Undefined => "undefined",
        };
        f.write_str(label)
    }
}

/// Typing indicator for a user in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub room_id: String,
    /// Empty when the topic carries no user segment
    pub user_email: String,
    pub is_typing: bool,
}

/// Online/offline status of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub user_email: String,
    pub is_online: bool,
    /// Opaque timestamp string, forwarded verbatim
    pub timestamp_utc: String,
}

/// Read or delivery acknowledgement for one comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub room_id: String,
    pub comment_id: String,
    pub comment_unique_id: String,
}

/// Result of routing one inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedEvent {
    /// Raw comment body, its schema is interpreted by the application
    Comment { body: String },
    Typing(TypingEvent),
    Online(PresenceEvent),
    Read(ReceiptEvent),
    Delivery(ReceiptEvent),
    /// Unrecognized topic, or required identifiers could not be extracted
    Undefined,
}

impl DecodedEvent {
    /// The kind of topic that produced this event
    pub fn kind(&self) -> EventKind {
        match self {
            DecodedEvent::Comment { .. } => EventKind::Comment,
            DecodedEvent::Typing(_) => EventKind::Typing,
            DecodedEvent::Online(_) => EventKind::Online,
            DecodedEvent::Read(_) => EventKind::Read,
            DecodedEvent::Delivery(_) => EventKind::Delivery,
            DecodedEvent::Undefined => EventKind::Undefined,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, DecodedEvent::Undefined)
    }
}

/// Which receipt a client acknowledges when publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Read,
    Delivered,
}
