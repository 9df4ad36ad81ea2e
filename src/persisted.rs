//! Codec for the single persisted-string slot the firmware exposes.
//!
//! The shutter emulation keeps `{shutter open, run mode, current setpoint}` in
//! that slot, framed as `MM[<0|1>;<run_mode>;<setpoint>]`. A slot value without
//! this exact framing means nothing has been saved yet; it is not an error.

use crate::dispatcher::CommandDispatcher;
use crate::error::{LaserError, LaserResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

/// Marks a slot value as written by this crate.
pub const SENTINEL: &str = "MM";

static RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^MM\[([01]);([^;\[\]\s]+);([^;\[\]\s]+)\]$").expect("static regex")
});

/// The restore point kept in the device slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedLaserState {
    pub shutter_open: bool,
    /// Wire-level run mode code, not the GUI label.
    pub run_mode: String,
    /// Setpoint exactly as the device formatted it.
    pub current_setpoint: String,
}

impl PersistedLaserState {
    pub fn new(
        shutter_open: bool,
        run_mode: impl Into<String>,
        current_setpoint: impl Into<String>,
    ) -> Self {
        Self {
            shutter_open,
            run_mode: run_mode.into(),
            current_setpoint: current_setpoint.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}[{};{};{}]",
            SENTINEL,
            if self.shutter_open { 1 } else { 0 },
            self.run_mode,
            self.current_setpoint
        )
    }

    /// Parse a slot value. `None` means no state has been saved.
    pub fn decode(raw: &str) -> Option<Self> {
        let captures = RECORD.captures(raw.trim())?;
        Some(Self {
            shutter_open: &captures[1] == "1",
            run_mode: captures[2].to_string(),
            current_setpoint: captures[3].to_string(),
        })
    }

    /// Tokens that would break the framing cannot be stored.
    fn ensure_encodable(&self) -> Result<(), String> {
        for (field, token) in [
            ("run mode", &self.run_mode),
            ("current setpoint", &self.current_setpoint),
        ] {
            if token.is_empty() {
                return Err(format!("{field} is empty"));
            }
            if token
                .chars()
                .any(|c| c == ';' || c == '[' || c == ']' || c.is_whitespace())
            {
                return Err(format!("{field} '{token}' contains a reserved character"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PersistedLaserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Read/write commands for the device's generic string slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSlot {
    pub read_command: String,
    pub write_command: String,
}

impl DeviceSlot {
    pub fn new(read_command: impl Into<String>, write_command: impl Into<String>) -> Self {
        Self {
            read_command: read_command.into(),
            write_command: write_command.into(),
        }
    }

    /// Read the slot. `Ok(None)` when it holds no record of ours.
    pub fn load(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<Option<PersistedLaserState>> {
        let raw = dispatcher.send(&self.read_command)?;
        let state = PersistedLaserState::decode(&raw);
        match &state {
            Some(state) => debug!(record = %state, "read persisted laser state"),
            None if raw.trim_start().starts_with(SENTINEL) => {
                warn!(raw = %raw, "ignoring malformed persisted laser state")
            }
            None => debug!("device slot holds no persisted laser state"),
        }
        Ok(state)
    }

    pub fn store(
        &self,
        dispatcher: &mut CommandDispatcher,
        state: &PersistedLaserState,
    ) -> LaserResult<()> {
        state.ensure_encodable().map_err(|reason| {
            LaserError::invalid("persisted state", &state.encode(), reason)
        })?;
        dispatcher.send_with_argument(&self.write_command, &state.encode())?;
        debug!(record = %state, "stored persisted laser state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimulatedLaser;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_encode_format() {
        let state = PersistedLaserState::new(false, "1", "50.0");
        assert_eq!(state.encode(), "MM[0;1;50.0]");
        assert_eq!(
            PersistedLaserState::new(true, "0", "12.50").to_string(),
            "MM[1;0;12.50]"
        );
    }

    #[test]
    fn test_decode_restores_fields() {
        let state = PersistedLaserState::new(false, "1", "12.5");
        assert_eq!(PersistedLaserState::decode(&state.encode()), Some(state));
        assert_eq!(
            PersistedLaserState::decode(" MM[1;2;0.0300]\r"),
            Some(PersistedLaserState::new(true, "2", "0.0300"))
        );
    }

    #[test]
    fn test_decode_without_framing_means_no_state() {
        for raw in [
            "",
            "0",
            "hello",
            "mm[0;1;50.0]",
            "XMM[0;1;50.0]",
            "MM",
            "MM[",
            "MM[0;1;50.0",
            "MM[2;1;50.0]",
            "MM[0;1]",
            "MM[0;1;50.0;9]",
            "MM[0;;50.0]",
        ] {
            assert_eq!(PersistedLaserState::decode(raw), None, "raw {raw:?}");
        }
    }

    #[test]
    fn test_reserved_characters_not_encodable() {
        assert!(PersistedLaserState::new(false, "1", "50.0").ensure_encodable().is_ok());
        assert!(PersistedLaserState::new(false, "1;2", "50.0").ensure_encodable().is_err());
        assert!(PersistedLaserState::new(false, "1", "5 0").ensure_encodable().is_err());
        assert!(PersistedLaserState::new(false, "", "50.0").ensure_encodable().is_err());
    }

    #[test]
    fn test_slot_store_and_load_through_device() {
        let laser = SimulatedLaser::new();
        let mut dispatcher = CommandDispatcher::new(Box::new(laser.port("SIM")))
            .with_reply_timeout(Duration::from_millis(50));
        let slot = DeviceSlot::new("guv?", "suv");

        assert_eq!(slot.load(&mut dispatcher).unwrap(), None);

        let state = PersistedLaserState::new(false, "1", "50.0");
        slot.store(&mut dispatcher, &state).unwrap();

        assert_eq!(laser.register("guv").as_deref(), Some("MM[0;1;50.0]"));
        assert_eq!(slot.load(&mut dispatcher).unwrap(), Some(state));
    }

    #[test]
    fn test_slot_unsupported_by_firmware() {
        let laser = SimulatedLaser::new().without_persistence_slot();
        let mut dispatcher = CommandDispatcher::new(Box::new(laser.port("SIM")))
            .with_reply_timeout(Duration::from_millis(50));
        let slot = DeviceSlot::new("guv?", "suv");

        let err = slot.load(&mut dispatcher).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedCommand);
    }
}
