//! Configuration for the realtime client
//!
//! Loaded from TOML. Credentials are never stored in the file itself, only the
//! names of the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Main realtime client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub client: ClientSection,
    pub mqtt: MqttSection,
}

/// Client identity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// MQTT client id (must match [a-zA-Z0-9._-]+); generated when absent
    pub id: Option<String>,
}

/// MQTT connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://host:port` or `mqtts://host:port`
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Pause before the transport redials after a connection error (default: 1000)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl MqttSection {
    /// Settings for a broker URL with every other field defaulted
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// Username/password pair handed to the transport on connect
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid client ID format: {0}")]
    InvalidClientId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RealtimeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RealtimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = &self.client.id {
            validate_client_id(id)?;
        }

        if self.mqtt.broker_url.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.broker_url must not be empty".to_string(),
            ));
        }

        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured client id, or a fresh `qiscus-{uuid}` one
    pub fn client_id(&self) -> String {
        self.client
            .id
            .clone()
            .unwrap_or_else(|| format!("qiscus-{}", uuid::Uuid::new_v4().simple()))
    }

    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Resolve credentials from the environment
    ///
    /// `None` when no username variable is configured. A configured but unset
    /// username variable is an error; a missing password resolves to empty.
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        let Some(username_env) = &self.mqtt.username_env else {
            return Ok(None);
        };

        let username = std::env::var(username_env)
            .map_err(|_| ConfigError::EnvVarNotFound(username_env.clone()))?;
        let password = self.get_mqtt_password().unwrap_or_default();
        Ok(Some(Credentials::new(username, password)))
    }
}

/// Validate client id format
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = RealtimeConfig::from_toml_str(
            r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
"#,
        )
        .unwrap();

        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.mqtt.reconnect_delay_ms, 1000);
        assert!(config.client.id.is_none());
        assert!(config.client_id().starts_with("qiscus-"));
    }

    #[test]
    fn test_full_config() {
        let config = RealtimeConfig::from_toml_str(
            r#"
[client]
id = "ios-client_1"

[mqtt]
broker_url = "mqtts://realtime.example.com:8883"
username_env = "QR_USER"
password_env = "QR_PASS"
keep_alive_secs = 30
reconnect_delay_ms = 250
"#,
        )
        .unwrap();

        assert_eq!(config.client_id(), "ios-client_1");
        assert_eq!(config.mqtt.broker_url, "mqtts://realtime.example.com:8883");
        assert_eq!(config.mqtt.username_env.as_deref(), Some("QR_USER"));
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.mqtt.reconnect_delay_ms, 250);
    }

    #[test]
    fn test_invalid_client_id_rejected() {
        let result = RealtimeConfig::from_toml_str(
            r#"
[client]
id = "bad id!"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidClientId(_))));
    }

    #[test]
    fn test_zero_keep_alive_rejected() {
        let result = RealtimeConfig::from_toml_str(
            r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
keep_alive_secs = 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_mqtt_section_is_parse_error() {
        let result = RealtimeConfig::from_toml_str("[client]\nid = \"a\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_credentials_absent_without_username_env() {
        let config = RealtimeConfig {
            client: ClientSection::default(),
            mqtt: MqttSection::new("mqtt://localhost:1883"),
        };
        assert_eq!(config.credentials().unwrap(), None);
    }

    #[test]
    fn test_credentials_missing_env_var_is_error() {
        let mut mqtt = MqttSection::new("mqtt://localhost:1883");
        mqtt.username_env = Some("QR_CONFIG_TEST_UNSET_USER".to_string());
        let config = RealtimeConfig {
            client: ClientSection::default(),
            mqtt,
        };

        assert!(matches!(
            config.credentials(),
            Err(ConfigError::EnvVarNotFound(name)) if name == "QR_CONFIG_TEST_UNSET_USER"
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("alice", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
