//! Configuration error types for the config module.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while locating, reading, validating or writing `laser-remote.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named file does not exist.
    #[error("configuration file {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("cannot encode configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("cannot write configuration file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but is out of range or inconsistent, e.g. a zero baud rate.
    #[error("{key}: {message}")]
    ValidationError { key: String, message: String },

    /// A `LASER_REMOTE_*` override could not be parsed.
    #[error("environment override {var}: {message}")]
    EnvParseError { var: String, message: String },

    /// `save` was called on a loader built from defaults only.
    #[error("configuration was not loaded from a file; give an explicit path to save to")]
    NoSavePath,
}

impl ConfigError {
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_key() {
        let err = ConfigError::validation("serial.baud_rate", "must be positive");
        assert_eq!(err.to_string(), "serial.baud_rate: must be positive");

        let err = ConfigError::env_parse("LASER_REMOTE_LASER_MODEL", "unknown laser model");
        assert!(err.to_string().contains("LASER_REMOTE_LASER_MODEL"));
    }
}
