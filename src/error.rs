//! Error taxonomy for property access and shutter emulation.

use crate::port::PortError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type LaserResult<T> = Result<T, LaserError>;

/// Everything that can go wrong between a property request and the device.
///
/// Nothing in the core retries. The only local recovery is dropping a
/// property's cached value when a read fails.
#[derive(Debug, Error)]
pub enum LaserError {
    /// Could not write, could not read, or timed out.
    #[error("Transport failure: {0}")]
    Transport(#[from] PortError),

    /// The device understood the line but does not implement the command.
    #[error("Command '{command}' is not supported by the device (reply: '{reply}')")]
    UnsupportedCommand { command: String, reply: String },

    /// The device returned a value this configuration cannot decode.
    #[error("Property '{property}': device value '{value}' is not understood")]
    ProtocolMismatch { property: String, value: String },

    /// A caller-supplied value failed validation; nothing was sent.
    #[error("Invalid value '{value}' for '{property}': {reason}")]
    InvalidValue {
        property: String,
        value: String,
        reason: String,
    },

    /// Set attempted on an immutable property.
    #[error("Property '{0}' is read-only")]
    ReadOnly(String),

    /// A precondition such as the emission toggle blocks the request.
    #[error("Property '{property}' cannot be set in the current state: {reason}")]
    NotSettableInCurrentState { property: String, reason: String },

    /// Invalid property or model registration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),
}

/// Flat error class, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    UnsupportedCommand,
    ProtocolMismatch,
    InvalidValue,
    ReadOnly,
    NotSettableInCurrentState,
    Configuration,
    UnknownProperty,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::UnsupportedCommand => "unsupported_command",
            Self::ProtocolMismatch => "protocol_mismatch",
            Self::InvalidValue => "invalid_value",
            Self::ReadOnly => "read_only",
            Self::NotSettableInCurrentState => "property_not_settable_in_current_state",
            Self::Configuration => "configuration",
            Self::UnknownProperty => "unknown_property",
        };
        f.write_str(name)
    }
}

impl LaserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::UnsupportedCommand { .. } => ErrorKind::UnsupportedCommand,
            Self::ProtocolMismatch { .. } => ErrorKind::ProtocolMismatch,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::ReadOnly(_) => ErrorKind::ReadOnly,
            Self::NotSettableInCurrentState { .. } => ErrorKind::NotSettableInCurrentState,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnknownProperty(_) => ErrorKind::UnknownProperty,
        }
    }

    pub(crate) fn mismatch(property: &str, value: impl Into<String>) -> Self {
        Self::ProtocolMismatch {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub(crate) fn invalid(property: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_settable(property: &str, reason: impl Into<String>) -> Self {
        Self::NotSettableInCurrentState {
            property: property.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_kind_of_each_variant() {
        let transport: LaserError = PortError::timeout(Duration::from_millis(100)).into();
        assert_eq!(transport.kind(), ErrorKind::Transport);

        let unsupported = LaserError::UnsupportedCommand {
            command: "guv?".into(),
            reply: "Syntax error".into(),
        };
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedCommand);

        assert_eq!(
            LaserError::mismatch("Run Mode", "7").kind(),
            ErrorKind::ProtocolMismatch
        );
        assert_eq!(
            LaserError::invalid("Current", "abc", "not a number").kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            LaserError::ReadOnly("Serial Number".into()).kind(),
            ErrorKind::ReadOnly
        );
        assert_eq!(
            LaserError::not_settable("Shutter", "emission off").kind(),
            ErrorKind::NotSettableInCurrentState
        );
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            LaserError::ReadOnly("Serial Number".into()).to_string(),
            "Property 'Serial Number' is read-only"
        );
        assert_eq!(
            LaserError::mismatch("Run Mode", "7").to_string(),
            "Property 'Run Mode': device value '7' is not understood"
        );
        assert_eq!(
            ErrorKind::NotSettableInCurrentState.to_string(),
            "property_not_settable_in_current_state"
        );
    }
}
