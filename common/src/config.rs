use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardConfig {
    pub outlet1_pin: u8,
    pub outlet2_pin: u8,
    pub motion_pin: u8,
    pub temperature_channel: u8,
    pub humidity_channel: u8,
    pub temperature_scale: f32,
    pub humidity_scale: f32,
    /// Relay inputs on this board energise when the line is driven low.
    pub active_low_outlets: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            outlet1_pin: 7,
            outlet2_pin: 8,
            motion_pin: 2,
            temperature_channel: 0,
            humidity_channel: 1,
            temperature_scale: 500.0,
            humidity_scale: 100.0,
            active_low_outlets: true,
        }
    }
}

impl BoardConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.temperature_scale.is_finite() || self.temperature_scale <= 0.0 {
            self.temperature_scale = defaults.temperature_scale;
        }
        if !self.humidity_scale.is_finite() || self.humidity_scale <= 0.0 {
            self.humidity_scale = defaults.humidity_scale;
        }
    }
}

/// Plaintext MQTT only; the broker must accept non-TLS connections on
/// `mqtt_port`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    /// Empty means "use the thing name".
    #[serde(default)]
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: String::new(),
            keep_alive_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub thing_name: String,
    pub poll_interval_ms: u64,
    pub shadow_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            thing_name: "iota".to_string(),
            poll_interval_ms: 1_000,
            shadow_timeout_ms: 5_000,
            connect_timeout_ms: 10_000,
            board: BoardConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("thing name is empty")]
    MissingThingName,
    #[error("mqtt host is empty")]
    MissingHost,
    #[error("mqtt port must be between 1 and 65535")]
    InvalidPort,
}

impl AgentConfig {
    pub fn sanitize(&mut self) {
        self.thing_name = self.thing_name.trim().to_string();
        self.poll_interval_ms = self.poll_interval_ms.clamp(100, 60_000);
        self.shadow_timeout_ms = self.shadow_timeout_ms.clamp(500, 30_000);
        self.connect_timeout_ms = self.connect_timeout_ms.clamp(1_000, 60_000);
        self.network.keep_alive_secs = self.network.keep_alive_secs.clamp(5, 1_200);
        self.board.sanitize();
    }

    /// Checks the settings without which the agent cannot reach its shadow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thing_name.trim().is_empty() {
            return Err(ConfigError::MissingThingName);
        }
        if self.network.mqtt_host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.network.mqtt_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        if self.network.client_id.trim().is_empty() {
            &self.thing_name
        } else {
            &self.network.client_id
        }
    }
}
