//! Transport layer for realtime messaging
//!
//! This module provides the transport abstraction consumed by
//! [`RealtimeClient`](crate::client::RealtimeClient) and its MQTT implementation.

use crate::config::Credentials;
use tokio::sync::mpsc;

pub mod mqtt;

pub use mqtt::ConnectionState;

/// Callback surface of a transport, delivered on one single-consumer channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport moved to a new connection state
    StateChanged(ConnectionState),
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: String },
}

/// Transport trait for realtime messaging
///
/// This trait provides an abstraction over the wire transport (primarily MQTT)
/// to enable dependency injection and testing. Implementations never gate
/// operations on connection state themselves; that is the client's job.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start connecting to the broker
    async fn connect(&mut self, credentials: Option<Credentials>) -> Result<(), Self::Error>;

    /// Publish a raw payload to a topic
    async fn publish_raw(&self, topic: &str, payload: &str) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter
    async fn subscribe_raw(&self, topic: &str) -> Result<(), Self::Error>;

    /// Unsubscribe from a topic filter
    async fn unsubscribe_raw(&self, topic: &str) -> Result<(), Self::Error>;

    /// Disconnect from the broker
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Install the channel that receives state changes and inbound messages
    fn set_event_sender(&mut self, sender: mpsc::Sender<TransportEvent>);
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;
