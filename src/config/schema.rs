//! Configuration schema definitions.
//!
//! Every section has `#[serde(default)]`, so a file only needs the keys it
//! changes.

use super::error::{ConfigError, ConfigResult};
use crate::dispatcher::{RECEIVE_TERMINATOR, SEND_TERMINATOR};
use crate::models::{LaserModel, ShutterPersistence};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link to the laser
    pub serial: SerialConfig,
    /// Which laser is attached and how its shutter is emulated
    pub laser: LaserConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make the link unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be positive"));
        }
        if self.serial.timeout_ms == 0 {
            return Err(ConfigError::validation("serial.timeout_ms", "must be positive"));
        }
        if self.serial.send_terminator.is_empty() {
            return Err(ConfigError::validation("serial.send_terminator", "must not be empty"));
        }
        if self.serial.receive_terminator.is_empty() {
            return Err(ConfigError::validation(
                "serial.receive_terminator",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name or alias; the CLI can override it
    pub port: Option<String>,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Appended to every command
    pub send_terminator: String,
    /// Ends every reply
    pub receive_terminator: String,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let line = PortConfiguration::default();
        Self {
            port: None,
            baud_rate: line.baud_rate,
            data_bits: line.data_bits,
            parity: line.parity,
            stop_bits: line.stop_bits,
            flow_control: line.flow_control,
            timeout_ms: 1000,
            send_terminator: SEND_TERMINATOR.to_string(),
            receive_terminator: RECEIVE_TERMINATOR.to_string(),
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port<'a>(&'a self, name: &'a str) -> &'a str {
        self.port_aliases
            .get(name)
            .map(|s| s.as_str())
            .unwrap_or(name)
    }

    /// Line settings for opening the port.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: self.timeout(),
        }
    }
}

/// Laser section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    pub model: LaserModel,
    pub shutter_persistence: ShutterPersistence,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error", or a full
    /// `EnvFilter` expression. `RUST_LOG` takes precedence.
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.timeout_ms, 1000);
        assert_eq!(config.serial.send_terminator, "\r");
        assert_eq!(config.serial.receive_terminator, "\r\n");
        assert_eq!(config.laser.model, LaserModel::Series06);
        assert_eq!(config.laser.shutter_persistence, ShutterPersistence::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("laser".to_string(), "/dev/ttyUSB0".to_string());

        assert_eq!(config.resolve_port("laser"), "/dev/ttyUSB0");
        assert_eq!(config.resolve_port("COM3"), "COM3");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            port = "COM7"
            parity = "even"

            [laser]
            model = "skyra"
            shutter_persistence = "volatile"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port.as_deref(), Some("COM7"));
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.laser.model, LaserModel::Skyra);
        assert_eq!(config.laser.shutter_persistence, ShutterPersistence::Volatile);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let result: Result<Config, _> = toml::from_str("[laser]\nmodel = \"07-series\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_port_configuration() {
        let mut serial = SerialConfig::default();
        serial.timeout_ms = 250;
        let line = serial.port_configuration();
        assert_eq!(line.timeout, Duration::from_millis(250));
        assert_eq!(line.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.serial.receive_terminator.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { ref key, .. }) if key == "serial.receive_terminator"
        ));
    }
}
