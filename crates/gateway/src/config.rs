//! Gateway configuration
//!
//! Loaded from an optional `canspy.toml` in the working directory, then an
//! optional explicit file, then `CANSPY_*` environment variables. Nested keys
//! use a double underscore: `CANSPY_BUS__CAN1=vcan0`.

use std::path::Path;

use capture::DebounceConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use forwarder::ForwarderConfig;
use relay::RelayConfig;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Where frames come from and go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusBackend {
    /// Linux SocketCAN interfaces
    #[serde(rename = "socketcan")]
    SocketCan,
    /// In-memory bus pair fed by a synthetic traffic source
    Virtual,
}

impl Default for BusBackend {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            BusBackend::SocketCan
        } else {
            BusBackend::Virtual
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub backend: BusBackend,
    /// Interface bridged as CAN1
    pub can1: String,
    /// Interface bridged as CAN2
    pub can2: String,
    /// Reader wake-up period, bounds shutdown latency (milliseconds)
    pub read_timeout_ms: u64,
    /// Synthetic frame period of the virtual backend (milliseconds)
    pub virtual_period_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            can1: "can0".to_string(),
            can2: "can1".to_string(),
            read_timeout_ms: 100,
            virtual_period_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Ring size per bus; holds `capacity - 1` frames
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: frame_queue::DEFAULT_CAPACITY,
        }
    }
}

/// Serial monitor link. Without a device, relayed lines go to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: Option<String>,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 115_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON records instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub log: LogConfig,
    pub bus: BusConfig,
    pub queue: QueueConfig,
    pub forwarder: ForwarderConfig,
    pub debounce: DebounceConfig,
    pub relay: RelayConfig,
    pub serial: SerialConfig,
}

impl GatewayConfig {
    /// Load from `canspy.toml`, `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, GatewayError> {
        let mut builder = Config::builder().add_source(File::with_name("canspy").required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::finish(builder.add_source(environment()))
    }

    /// Parse a TOML document, without file or environment sources
    pub fn from_toml(text: &str) -> Result<Self, GatewayError> {
        Self::finish(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, GatewayError> {
        Ok(builder.build()?.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CANSPY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::ReceiveMode;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.queue.capacity, 8);
        assert_eq!(config.forwarder.poll_period_ms, 100);
        assert_eq!(config.debounce.threshold_ms, 20);
        assert_eq!(config.relay.mode, ReceiveMode::NonBlocking);
        assert_eq!(config.serial.device, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GatewayConfig::from_toml(
            r#"
            [bus]
            backend = "virtual"
            can1 = "vcan0"

            [relay]
            mode = "blocking"

            [serial]
            device = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();

        assert_eq!(config.bus.backend, BusBackend::Virtual);
        assert_eq!(config.bus.can1, "vcan0");
        assert_eq!(config.bus.can2, "can1");
        assert_eq!(config.relay.mode, ReceiveMode::Blocking);
        assert_eq!(config.relay.poll_period_ms, 100);
        assert_eq!(config.serial.device.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let result = GatewayConfig::from_toml(
            r#"
            [queue]
            capacity = "lots"
            "#,
        );
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}
