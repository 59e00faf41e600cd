//! MQTT transport for the realtime client
//!
//! This module separates pure functions from I/O operations for better
//! testability.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state machine and option construction
//! - [`message_handler`] - Pure event routing: raw MQTT events and the
//!   (topic, payload) to [`DecodedEvent`](crate::protocol::DecodedEvent) router
//! - [`client`] - Impure I/O operations around the rumqttc event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use qiscus_realtime::config::MqttSection;
//! use qiscus_realtime::transport::mqtt::MqttClient;
//! use qiscus_realtime::transport::Transport;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection::new("mqtt://localhost:1883");
//! let mut transport = MqttClient::new("my-client", config)?;
//! let (tx, _rx) = tokio::sync::mpsc::channel(64);
//! transport.set_event_sender(tx);
//! transport.connect(None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{configure_mqtt_options, ConnectionState, ConnectionStateMachine, MqttError};
pub use message_handler::{EventRoute, EventRouter, MessageHandler};
