//! Pure message routing for MQTT events
//!
//! [`MessageHandler`] turns raw rumqttc events into routing decisions and
//! [`EventRouter`] turns one inbound (topic, payload) pair into exactly one
//! [`DecodedEvent`].

use crate::protocol::payload::{decode_presence, decode_receipt, decode_typing};
use crate::protocol::topics::{classify, online_user, room_id, user_email};
use crate::protocol::{DecodedEvent, EventKind, PresenceEvent, ReceiptEvent, TypingEvent};
use rumqttc::v5::Event;
use tracing::debug;

/// Routes inbound (topic, payload) pairs to typed events
///
/// Stateless and synchronous: no I/O, no shared state.
pub struct EventRouter;

impl EventRouter {
    /// Classify the topic and decode the payload into one event
    ///
    /// Never fails. Unrecognized topics, and topics whose required identifiers
    /// cannot be extracted, yield [`DecodedEvent::Undefined`].
    pub fn route(topic: &str, payload: &str) -> DecodedEvent {
        Self::decode(classify(topic), topic, payload)
    }

    /// Decode a message whose topic was already classified as `kind`
    pub fn decode(kind: EventKind, topic: &str, payload: &str) -> DecodedEvent {
        let event = match kind {
            EventKind::Comment => Some(DecodedEvent::Comment {
                body: payload.to_string(),
            }),
            EventKind::Typing => Self::decode_typing(topic, payload),
            EventKind::Online => Self::decode_presence(topic, payload),
            EventKind::Read => Self::decode_receipt(topic, payload).map(DecodedEvent::Read),
            EventKind::Delivery => {
                Self::decode_receipt(topic, payload).map(DecodedEvent::Delivery)
            }
            EventKind::Undefined => None,
        };

        event.unwrap_or_else(|| {
            debug!(topic, %kind, "Discarding message without a recognizable event");
            DecodedEvent::Undefined
        })
    }

    fn decode_typing(topic: &str, payload: &str) -> Option<DecodedEvent> {
        let room_id = non_empty(room_id(topic))?;
        Some(DecodedEvent::Typing(TypingEvent {
            room_id,
            // Empty when the topic carries the `_` user placeholder
            user_email: user_email(topic),
            is_typing: decode_typing(payload),
        }))
    }

    fn decode_presence(topic: &str, payload: &str) -> Option<DecodedEvent> {
        let user_email = non_empty(online_user(topic))?;
        let (is_online, timestamp_utc) = decode_presence(payload);
        Some(DecodedEvent::Online(PresenceEvent {
            user_email,
            is_online,
            timestamp_utc,
        }))
    }

    fn decode_receipt(topic: &str, payload: &str) -> Option<ReceiptEvent> {
        let room_id = non_empty(room_id(topic))?;
        let (comment_id, comment_unique_id) = decode_receipt(payload);
        let comment_id = non_empty(comment_id)?;
        Some(ReceiptEvent {
            room_id,
            comment_id,
            comment_unique_id,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Pure routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => {
                use rumqttc::v5::mqttbytes::v5::Packet;
                match incoming {
                    Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                    Packet::Publish(publish) => EventRoute::MessageReceived {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload.to_vec(),
                        retain: publish.retain,
                    },
                    Packet::Disconnect(_) => EventRoute::Disconnected,
                    Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                        packet_id: suback.pkid,
                        return_codes: format!("{:?}", suback.return_codes),
                    },
                    Packet::UnsubAck(_) => EventRoute::UnsubscribeConfirmed,
                    other => EventRoute::InfrastructureEvent(format!("{other:?}")),
                }
            }
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Message body as text; messages without a UTF-8 body are not routable
    pub fn payload_as_str(payload: &[u8]) -> Option<&str> {
        std::str::from_utf8(payload).ok()
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed with return codes
    SubscriptionConfirmed { packet_id: u16, return_codes: String },
    /// Unsubscribe acknowledged
    UnsubscribeConfirmed,
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
