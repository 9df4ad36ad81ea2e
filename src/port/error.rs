//! Transport-level error types.
//!
//! Kept separate from `LaserError` so the port layer knows nothing about
//! properties or the instrument protocol.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the serial device.
#[derive(Debug, Error)]
pub enum PortError {
    /// The serial port does not exist on this system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No complete reply arrived in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device closed the link or returned bytes that are not a reply.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Whether this error only means "nothing to read yet".
    ///
    /// Real ports report an empty read as `TimedOut`, the mock as
    /// `WouldBlock`, some drivers as our own `Timeout`.
    pub fn is_idle(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
