//! Pure connection state management for the MQTT transport
//!
//! This module contains the connection state machine that gates send-class
//! operations, MQTT option construction and transport errors.

use crate::config::{Credentials, MqttSection};
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Transport connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(label)
    }
}

/// Tracks the transport connection state
///
/// Written only from the transport delivery path, read from any caller. The
/// state is a single atomic byte so readers never block the writer.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: AtomicU8,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Send-class operations (publish, subscribe) are only permitted while connected
    pub fn can_send(&self) -> bool {
        Self::can_send_in(self.state())
    }

    /// Pure form of [`ConnectionStateMachine::can_send`]
    pub fn can_send_in(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Record a state reported by the transport
    ///
    /// Returns true when the state actually changed. Unexpected transitions are
    /// still recorded, the transport is the source of truth.
    pub fn on_transport_state_changed(&self, new_state: ConnectionState) -> bool {
        let previous =
            ConnectionState::from_u8(self.state.swap(new_state as u8, Ordering::AcqRel));
        if previous == new_state {
            return false;
        }

        if Self::is_expected_transition(previous, new_state) {
            debug!(from = %previous, to = %new_state, "Connection state changed");
        } else {
            warn!(from = %previous, to = %new_state, "Unexpected connection state transition");
        }
        true
    }

    /// Transitions the transport is expected to report
    ///
    /// `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`,
    /// plus a direct drop to `Disconnected` from `Connecting` or `Connected`, and
    /// a disconnect requested while still connecting.
    pub fn is_expected_transition(from: ConnectionState, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connecting, Disconnecting)
        )
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Unsubscribe failed")]
    UnsubscribeFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Transport already started")]
    AlreadyConnected,
}

/// Build MQTT options from config (pure function)
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
    credentials: Option<&Credentials>,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let secure = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" => true,
        _ => return Err(MqttError::InvalidBrokerUrl(config.broker_url.clone())),
    };

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url.port().unwrap_or(if secure { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    // TLS trust is delegated to the default root store
    if secure {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(credentials) = credentials {
        mqtt_options.set_credentials(&credentials.username, &credentials.password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    Ok(mqtt_options)
}
