//! Configuration types for the MQTT-to-webhook bridge
//!
//! This module provides configuration structures for the bridge including
//! MQTT transport settings, channel-to-webhook mappings, identity storage,
//! and delivery behavior.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Default MQTT broker port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default MQTT topic filter for Meshtastic JSON uplinks
pub const DEFAULT_TOPIC_FILTER: &str = "msh/+/2/json/#";

/// Default webhook delivery timeout
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the inbound event queue
pub const DEFAULT_QUEUE_SIZE: usize = 256;

/// Main configuration for the bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// MQTT transport settings (consumed by the node binary)
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Channel number to webhook URL mappings
    ///
    /// TOML map keys are strings; they must parse as channel numbers
    /// (see [`WebhookMap::from_config`]).
    #[serde(default)]
    pub webhooks: HashMap<String, String>,

    /// Identity storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Delivery behavior settings
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl BridgeConfig {
    /// Validate the configuration
    ///
    /// Checks everything that would otherwise only fail at runtime:
    /// webhook channel keys must be numeric, URLs non-empty, and the
    /// MQTT topic filter present.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.topic.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "mqtt.topic must not be empty".to_string(),
            ));
        }
        for (channel, url) in &self.webhooks {
            channel.parse::<u32>().map_err(|_| {
                BridgeError::InvalidConfig(format!("webhook channel key is not a number: {channel}"))
            })?;
            if url.is_empty() {
                return Err(BridgeError::InvalidConfig(format!(
                    "webhook URL for channel {channel} is empty"
                )));
            }
        }
        if self.delivery.queue_size == 0 {
            return Err(BridgeError::InvalidConfig(
                "delivery.queue_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// MQTT broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Optional username for broker authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for broker authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Topic filter to subscribe to
    #[serde(default = "default_topic_filter")]
    pub topic: String,

    /// Client identifier presented to the broker
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delay before reconnecting after a transport error
    #[serde(with = "humantime_serde", default = "default_reconnect_delay")]
    pub reconnect_delay: Duration,
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_topic_filter() -> String {
    DEFAULT_TOPIC_FILTER.to_string()
}

fn default_client_id() -> String {
    "meshhook".to_string()
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            topic: DEFAULT_TOPIC_FILTER.to_string(),
            client_id: "meshhook".to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Identity storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("meshhook_nodes.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Delivery behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Timeout for a single webhook delivery attempt
    #[serde(with = "humantime_serde", default = "default_delivery_timeout")]
    pub timeout: Duration,

    /// Capacity of the inbound event queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_delivery_timeout() -> Duration {
    DEFAULT_DELIVERY_TIMEOUT
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// Mapping from logical channel number to webhook endpoint
///
/// Configured-ness of a channel is key presence, never truthiness:
/// channel 0 is a perfectly valid destination.
#[derive(Debug, Clone, Default)]
pub struct WebhookMap {
    endpoints: HashMap<u32, String>,
}

impl WebhookMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[webhooks]` config section, parsing channel keys
    pub fn from_config(webhooks: &HashMap<String, String>) -> Result<Self> {
        let mut endpoints = HashMap::new();
        for (channel, url) in webhooks {
            let channel = channel.parse::<u32>().map_err(|_| {
                BridgeError::InvalidConfig(format!("webhook channel key is not a number: {channel}"))
            })?;
            endpoints.insert(channel, url.clone());
        }
        Ok(Self { endpoints })
    }

    /// Insert a channel mapping
    pub fn insert(&mut self, channel: u32, url: impl Into<String>) {
        self.endpoints.insert(channel, url.into());
    }

    /// Check whether a channel has a configured destination
    pub fn contains(&self, channel: u32) -> bool {
        self.endpoints.contains_key(&channel)
    }

    /// Get the webhook endpoint for a channel
    pub fn endpoint(&self, channel: u32) -> Option<&str> {
        self.endpoints.get(&channel).map(String::as_str)
    }

    /// Number of configured channels
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Check if no channels are configured
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Builder for BridgeConfig
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set MQTT broker host and port
    pub fn broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.mqtt.host = host.into();
        self.config.mqtt.port = port;
        self
    }

    /// Set MQTT credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.mqtt.username = Some(username.into());
        self.config.mqtt.password = Some(password.into());
        self
    }

    /// Set the MQTT topic filter
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.mqtt.topic = topic.into();
        self
    }

    /// Map a channel number to a webhook URL
    pub fn webhook(mut self, channel: u32, url: impl Into<String>) -> Self {
        self.config.webhooks.insert(channel.to_string(), url.into());
        self
    }

    /// Set the identity database path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.db_path = path.into();
        self
    }

    /// Set the delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery.timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.mqtt.port, DEFAULT_MQTT_PORT);
        assert_eq!(config.delivery.timeout, DEFAULT_DELIVERY_TIMEOUT);
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = BridgeConfigBuilder::new()
            .broker("broker.local", 1884)
            .credentials("mesh", "secret")
            .webhook(0, "https://example.com/hook0")
            .webhook(1, "https://example.com/hook1")
            .delivery_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.username.as_deref(), Some("mesh"));
        assert_eq!(config.webhooks.len(), 2);
        assert_eq!(config.delivery.timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_webhook_map_from_config() {
        let mut raw = HashMap::new();
        raw.insert("0".to_string(), "https://example.com/a".to_string());
        raw.insert("7".to_string(), "https://example.com/b".to_string());

        let map = WebhookMap::from_config(&raw).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains(0));
        assert!(map.contains(7));
        assert!(!map.contains(1));
        assert_eq!(map.endpoint(0), Some("https://example.com/a"));
        assert_eq!(map.endpoint(3), None);
    }

    #[test]
    fn test_webhook_map_rejects_bad_key() {
        let mut raw = HashMap::new();
        raw.insert("primary".to_string(), "https://example.com".to_string());
        assert!(WebhookMap::from_config(&raw).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config = BridgeConfigBuilder::new().webhook(0, "").build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let raw = r#"
            [mqtt]
            host = "192.168.1.2"
            port = 1883
            username = "user"
            password = "password"
            topic = "msh/EU_868/2/json/#"

            [webhooks]
            0 = "https://example.com/hook0"
            1 = "https://example.com/hook1"

            [storage]
            db_path = "nodes.db"

            [delivery]
            timeout = "5s"
        "#;

        let config: BridgeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.mqtt.host, "192.168.1.2");
        assert_eq!(config.mqtt.topic, "msh/EU_868/2/json/#");
        assert_eq!(config.webhooks.len(), 2);
        assert_eq!(config.delivery.timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());

        let map = WebhookMap::from_config(&config.webhooks).unwrap();
        assert!(map.contains(0));
        assert!(map.contains(1));
    }
}
