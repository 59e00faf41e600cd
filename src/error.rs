//! Error types for the realtime client
//!
//! Malformed inbound messages are never errors (they decode to
//! [`DecodedEvent::Undefined`](crate::protocol::DecodedEvent::Undefined)).
//! Errors here cover gated operations, transport failures and configuration.

use crate::transport::ConnectionState;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for realtime client operations
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Publish or subscribe attempted while the transport is not connected
    #[error("Not connected - current state: {state}")]
    NotConnected { state: ConnectionState },

    #[error("Client already started")]
    AlreadyStarted,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Transport error: {0}")]
    TransportError(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

impl RealtimeError {
    /// Create not connected error
    pub fn not_connected(state: ConnectionState) -> Self {
        Self::NotConnected { state }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap a transport-specific error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError(Box::new(error))
    }

    /// True for the "operation not permitted in this state" outcome
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static URL_CREDENTIALS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(mqtts?|tcp|ssl)://[^/@\s]+@").expect("url credentials pattern is valid")
});

const MAX_MESSAGE_LEN: usize = 500;

/// Strip credentials from error text before it reaches the logs
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = URL_CREDENTIALS_PATTERN
        .replace_all(&sanitized, "${1}://***@")
        .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for realtime client operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;
