//! Application-facing sink for decoded realtime events
//!
//! One notification per [`DecodedEvent`] variant plus one for connection state
//! transitions. Sink methods are called from the single delivery task, in
//! arrival order, and must not block.

use crate::protocol::{DecodedEvent, PresenceEvent, ReceiptEvent, TypingEvent};
use crate::transport::ConnectionState;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of decoded realtime events
///
/// Every method has an empty default so applications implement only what they
/// care about.
pub trait RealtimeEventSink: Send + Sync {
    fn on_connection_state_changed(&self, _state: ConnectionState) {}

    /// Raw comment body, forwarded verbatim
    fn on_comment(&self, _body: &str) {}

    fn on_typing(&self, _event: &TypingEvent) {}

    fn on_presence(&self, _event: &PresenceEvent) {}

    fn on_receipt_read(&self, _event: &ReceiptEvent) {}

    fn on_receipt_delivered(&self, _event: &ReceiptEvent) {}

    /// Dispatch one decoded event to the matching method
    fn handle(&self, event: &DecodedEvent) {
        match event {
            DecodedEvent::Comment { body } => self.on_comment(body),
            DecodedEvent::Typing(typing) => self.on_typing(typing),
            DecodedEvent::Online(presence) => self.on_presence(presence),
            DecodedEvent::Read(receipt) => self.on_receipt_read(receipt),
            DecodedEvent::Delivery(receipt) => self.on_receipt_delivered(receipt),
            DecodedEvent::Undefined => {}
        }
    }
}

/// Everything a sink can be told, as one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkNotification {
    ConnectionState(ConnectionState),
    Event(DecodedEvent),
}

/// Sink forwarding notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SinkNotification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, notification: SinkNotification) {
        if self.sender.send(notification).is_err() {
            debug!("Sink receiver dropped, discarding notification");
        }
    }
}

impl RealtimeEventSink for ChannelSink {
    fn on_connection_state_changed(&self, state: ConnectionState) {
        self.forward(SinkNotification::ConnectionState(state));
    }

    fn handle(&self, event: &DecodedEvent) {
        if !event.is_undefined() {
            self.forward(SinkNotification::Event(event.clone()));
        }
    }
}
