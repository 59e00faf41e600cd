//! Qiscus Realtime - Rust Implementation
//!
//! Client side of the Qiscus realtime chat channel over MQTT.
//!
//! # Overview
//!
//! - Topic classification and field extraction for the realtime topic grammar
//! - Payload decoding for typing, presence and receipt messages
//! - An event router turning `(topic, payload)` into typed events
//! - A connection state machine gating publish and subscribe
//! - A client façade delivering events to an application sink
//!
//! # Quick Start
//!
//! ```rust
//! use qiscus_realtime::protocol::{DecodedEvent, TopicBuilder};
//! use qiscus_realtime::transport::mqtt::EventRouter;
//!
//! let topic = TopicBuilder::typing("55", "55", "bob@x.com");
//! assert_eq!(topic, "r/55/55/bob@x.com/t");
//!
//! match EventRouter::route(&topic, "true") {
//!     DecodedEvent::Typing(typing) => {
//!         assert_eq!(typing.room_id, "55");
//!         assert_eq!(typing.user_email, "bob@x.com");
//!         assert!(typing.is_typing);
//!     }
//!     other => panic!("unexpected event: {other:?}"),
//! }
//!
//! // Unknown shapes never fail, they are dropped as undefined
//! assert!(EventRouter::route("not/a/known/shape", "").is_undefined());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod sink;
pub mod testing;
pub mod transport;

pub use client::RealtimeClient;
pub use config::{Credentials, RealtimeConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use protocol::{
    DecodedEvent, EventKind, PresenceEvent, ReceiptEvent, ReceiptStatus, TopicBuilder, TypingEvent,
};
pub use sink::{ChannelSink, RealtimeEventSink, SinkNotification};
pub use transport::mqtt::{ConnectionState, ConnectionStateMachine, EventRouter};
pub use transport::{MqttTransport, Transport, TransportEvent};
