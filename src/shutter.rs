//! Shutter (emission pause) emulation for firmware without a native pause.
//!
//! Closing records the live run mode and current setpoint as a restore
//! point, drives the setpoint to zero and parks the laser in constant-current
//! mode. Opening re-enters the recorded run mode and setpoint.
//!
//! The restore point lives either in process memory ([`RestorePoint::Volatile`],
//! lost on restart) or in the device's persisted-string slot
//! ([`RestorePoint::Device`], survives restart). Both share the transition
//! logic below.
//!
//! Failure handling is single-attempt: the first failing step's error is
//! returned unchanged and the local state is left as it was. In particular a
//! close that fails after the restore point was written does not undo that
//! write.

use crate::dispatcher::CommandDispatcher;
use crate::enumeration::{EnumerationTable, StateTable};
use crate::error::{ErrorKind, LaserError, LaserResult};
use crate::persisted::{DeviceSlot, PersistedLaserState};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterState {
    Open,
    Closed,
}

impl ShutterState {
    pub const ALL: [ShutterState; 2] = [ShutterState::Closed, ShutterState::Open];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ShutterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShutterState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "1" => Ok(Self::Open),
            "closed" | "close" | "0" => Ok(Self::Closed),
            other => Err(format!("expected 'open' or 'closed', got '{other}'")),
        }
    }
}

/// Instrument operating state query whose table says whether the shutter may be open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusGate {
    pub query: String,
    pub states: StateTable,
}

/// Commands the emulation issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutterCommands {
    /// Reads the wire-level run mode.
    pub run_mode_query: String,
    /// Run modes; each item's `set_command` re-enters that mode.
    pub run_modes: EnumerationTable,
    /// Reads the current setpoint.
    pub setpoint_query: String,
    /// `<setpoint_command> <value>` writes the current setpoint.
    pub setpoint_command: String,
    /// Setpoint written while closed.
    pub zero_setpoint: String,
    /// Enters constant-current (safe) mode.
    pub safe_mode_command: String,
    /// Emission toggle query; a reply other than "1" blocks opening.
    pub emission_query: Option<String>,
    pub status_gate: Option<StatusGate>,
}

/// Where the pre-close operating point is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePoint {
    Volatile(Option<PersistedLaserState>),
    Device(DeviceSlot),
}

impl RestorePoint {
    pub fn volatile() -> Self {
        Self::Volatile(None)
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Device(_))
    }

    fn load(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<Option<PersistedLaserState>> {
        match self {
            Self::Volatile(saved) => Ok(saved.clone()),
            Self::Device(slot) => slot.load(dispatcher),
        }
    }

    fn save(
        &mut self,
        dispatcher: &mut CommandDispatcher,
        state: PersistedLaserState,
    ) -> LaserResult<()> {
        match self {
            Self::Volatile(saved) => {
                *saved = Some(state);
                Ok(())
            }
            Self::Device(slot) => slot.store(dispatcher, &state),
        }
    }
}

/// Open/closed state machine on top of a restore point.
#[derive(Debug, Clone)]
pub struct ShutterEmulation {
    commands: ShutterCommands,
    restore: RestorePoint,
    state: ShutterState,
}

impl ShutterEmulation {
    /// Create the emulation and bring the instrument in line with the saved state.
    ///
    /// With a saved record, its shutter flag becomes the initial state; a
    /// closed record re-applies the closed operating point in case an earlier
    /// session stopped halfway through a close. Without a record the shutter
    /// starts open and the live run mode and setpoint are saved as the baseline.
    pub fn incarnate(
        dispatcher: &mut CommandDispatcher,
        commands: ShutterCommands,
        restore: RestorePoint,
    ) -> LaserResult<Self> {
        let mut shutter = Self {
            commands,
            restore,
            state: ShutterState::Open,
        };

        match shutter.restore.load(dispatcher)? {
            Some(saved) if saved.shutter_open => {
                info!(record = %saved, "shutter resumes open");
            }
            Some(saved) => {
                info!(record = %saved, "shutter resumes closed, re-applying closed operating point");
                shutter.apply_closed_operating_point(dispatcher)?;
                shutter.state = ShutterState::Closed;
            }
            None => {
                let (run_mode, setpoint) = shutter.read_operating_point(dispatcher)?;
                let baseline = PersistedLaserState::new(true, run_mode, setpoint);
                info!(record = %baseline, "no saved shutter state, storing baseline");
                shutter.restore.save(dispatcher, baseline)?;
            }
        }

        Ok(shutter)
    }

    /// Local state, authoritative after the last successful transition.
    pub fn state(&self) -> ShutterState {
        self.state
    }

    pub fn restore_point(&self) -> &RestorePoint {
        &self.restore
    }

    /// State as reported to the user: open only if the instrument's operating
    /// state also permits it.
    pub fn report(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<ShutterState> {
        if self.state == ShutterState::Closed {
            return Ok(ShutterState::Closed);
        }
        if self.operating_state_permits(dispatcher)? {
            Ok(ShutterState::Open)
        } else {
            Ok(ShutterState::Closed)
        }
    }

    /// Re-derive the local state from the persisted record.
    ///
    /// A volatile restore point has nothing to re-read; the local state stands.
    pub fn resync(&mut self, dispatcher: &mut CommandDispatcher) -> LaserResult<ShutterState> {
        if self.restore.is_persistent() {
            if let Some(saved) = self.restore.load(dispatcher)? {
                self.state = if saved.shutter_open {
                    ShutterState::Open
                } else {
                    ShutterState::Closed
                };
            }
        }
        Ok(self.state)
    }

    /// Drive the shutter to `target`. Requests for the current state succeed
    /// without touching the device.
    pub fn request(
        &mut self,
        property: &str,
        dispatcher: &mut CommandDispatcher,
        target: ShutterState,
    ) -> LaserResult<()> {
        if target == self.state {
            debug!(property, state = %target, "shutter already in requested state");
            return Ok(());
        }
        match target {
            ShutterState::Closed => self.close(property, dispatcher),
            ShutterState::Open => self.open(property, dispatcher),
        }
    }

    fn close(&mut self, property: &str, dispatcher: &mut CommandDispatcher) -> LaserResult<()> {
        let (run_mode, setpoint) = self.read_operating_point(dispatcher)?;
        // A mode that cannot be re-entered would leave the laser dark after close.
        self.run_mode_command(property, &run_mode)?;
        let record = PersistedLaserState::new(false, run_mode, setpoint);

        // The restore point must be saved before output drops to zero.
        self.restore.save(dispatcher, record.clone())?;
        self.apply_closed_operating_point(dispatcher)?;

        self.state = ShutterState::Closed;
        info!(record = %record, "shutter closed");
        Ok(())
    }

    fn open(&mut self, property: &str, dispatcher: &mut CommandDispatcher) -> LaserResult<()> {
        if let Some(query) = &self.commands.emission_query {
            let emission = dispatcher.send(query)?;
            if emission != "1" {
                return Err(LaserError::not_settable(property, "laser emission is off"));
            }
        }
        if !self.operating_state_permits(dispatcher)? {
            return Err(LaserError::not_settable(
                property,
                "instrument operating state does not permit opening",
            ));
        }

        let saved = self
            .restore
            .load(dispatcher)?
            .ok_or_else(|| LaserError::mismatch(property, "no saved restore point"))?;

        let mode_command = self.run_mode_command(property, &saved.run_mode)?;
        dispatcher.send(&mode_command)?;
        dispatcher.send_with_argument(&self.commands.setpoint_command, &saved.current_setpoint)?;

        // Keep the same restore point but mark it open, so a restart resumes open.
        let reopened = PersistedLaserState {
            shutter_open: true,
            ..saved
        };
        if let Err(e) = self.restore.save(dispatcher, reopened.clone()) {
            warn!(error = %e, "shutter opened but its state could not be recorded");
        }

        self.state = ShutterState::Open;
        info!(record = %reopened, "shutter opened");
        Ok(())
    }

    fn read_operating_point(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<(String, String)> {
        let run_mode = dispatcher.send(&self.commands.run_mode_query)?;
        let setpoint = dispatcher.send(&self.commands.setpoint_query)?;
        Ok((run_mode, setpoint))
    }

    fn apply_closed_operating_point(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<()> {
        dispatcher.send_with_argument(&self.commands.setpoint_command, &self.commands.zero_setpoint)?;
        dispatcher.send(&self.commands.safe_mode_command)?;
        Ok(())
    }

    fn operating_state_permits(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<bool> {
        let Some(gate) = &self.commands.status_gate else {
            return Ok(true);
        };
        let code = dispatcher.send(&gate.query)?;
        let permits = gate.states.permits_shutter(&code);
        if !permits {
            debug!(code = %code, "operating state does not permit an open shutter");
        }
        Ok(permits)
    }

    fn run_mode_command(&self, property: &str, run_mode: &str) -> LaserResult<String> {
        let item = self
            .commands
            .run_modes
            .decode(run_mode)
            .ok_or_else(|| LaserError::mismatch(property, run_mode))?;
        item.set_command.clone().ok_or_else(|| {
            LaserError::configuration(format!(
                "run mode '{}' has no command to re-enter it",
                item.gui_name
            ))
        })
    }
}

/// Whether a slot read failed because the firmware lacks the slot commands.
pub(crate) fn is_unsupported(error: &LaserError) -> bool {
    error.kind() == ErrorKind::UnsupportedCommand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumeration::{EnumerationItem, StateEntry};
    use crate::port::SimulatedLaser;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn commands() -> ShutterCommands {
        ShutterCommands {
            run_mode_query: "gam?".into(),
            run_modes: EnumerationTable::new([
                EnumerationItem::new("0", "Constant Current").with_set_command("ci"),
                EnumerationItem::new("1", "Constant Power").with_set_command("cp"),
                EnumerationItem::new("2", "Modulation").with_set_command("em"),
            ])
            .unwrap(),
            setpoint_query: "glc?".into(),
            setpoint_command: "slc".into(),
            zero_setpoint: "0".into(),
            safe_mode_command: "ci".into(),
            emission_query: Some("l?".into()),
            status_gate: Some(StatusGate {
                query: "gom?".into(),
                states: StateTable::new([
                    StateEntry::new("0", "Off", false),
                    StateEntry::new("2", "Continuous", true),
                    StateEntry::new("5", "Fault", false),
                ])
                .unwrap(),
            }),
        }
    }

    fn dispatcher(laser: &SimulatedLaser) -> CommandDispatcher {
        CommandDispatcher::new(Box::new(laser.port("SIM")))
            .with_reply_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_shutter_state_parsing() {
        assert_eq!("open".parse::<ShutterState>(), Ok(ShutterState::Open));
        assert_eq!(" Closed ".parse::<ShutterState>(), Ok(ShutterState::Closed));
        assert!("ajar".parse::<ShutterState>().is_err());
    }

    #[test]
    fn test_volatile_close_and_open() {
        let laser = SimulatedLaser::new();
        let mut d = dispatcher(&laser);
        let mut shutter =
            ShutterEmulation::incarnate(&mut d, commands(), RestorePoint::volatile()).unwrap();
        assert_eq!(shutter.state(), ShutterState::Open);

        laser.set_register("glc", "42.0");
        shutter.request("Shutter", &mut d, ShutterState::Closed).unwrap();
        assert_eq!(laser.register("glc").as_deref(), Some("0"));
        assert_eq!(laser.register("gam").as_deref(), Some("0"));
        // Nothing was written to the device slot.
        assert_eq!(laser.register("guv").as_deref(), Some(""));

        shutter.request("Shutter", &mut d, ShutterState::Open).unwrap();
        assert_eq!(laser.register("glc").as_deref(), Some("42.0"));
        assert_eq!(laser.register("gam").as_deref(), Some("1"));
        assert_eq!(
            shutter.restore_point(),
            &RestorePoint::Volatile(Some(PersistedLaserState::new(true, "1", "42.0")))
        );
    }

    #[test]
    fn test_report_gated_by_operating_state() {
        let laser = SimulatedLaser::new();
        let mut d = dispatcher(&laser);
        let shutter =
            ShutterEmulation::incarnate(&mut d, commands(), RestorePoint::volatile()).unwrap();

        assert_eq!(shutter.report(&mut d).unwrap(), ShutterState::Open);
        laser.set_register("gom", "5");
        assert_eq!(shutter.report(&mut d).unwrap(), ShutterState::Closed);
        assert_eq!(shutter.state(), ShutterState::Open);
    }

    #[test]
    fn test_unknown_saved_run_mode_is_mismatch() {
        let laser = SimulatedLaser::new();
        laser.set_register("guv", "MM[0;9;10.0]");
        let mut d = dispatcher(&laser);
        let slot = RestorePoint::Device(DeviceSlot::new("guv?", "suv"));
        let mut shutter = ShutterEmulation::incarnate(&mut d, commands(), slot).unwrap();

        let err = shutter
            .request("Shutter", &mut d, ShutterState::Open)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
        assert_eq!(shutter.state(), ShutterState::Closed);
    }

    #[test]
    fn test_close_refuses_run_mode_it_cannot_restore() {
        let laser = SimulatedLaser::new();
        let mut d = dispatcher(&laser);
        let slot = RestorePoint::Device(DeviceSlot::new("guv?", "suv"));
        let mut shutter = ShutterEmulation::incarnate(&mut d, commands(), slot).unwrap();
        let record = laser.register("guv");

        laser.set_register("gam", "9");
        laser.clear_history();
        let err = shutter
            .request("Shutter", &mut d, ShutterState::Closed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
        assert_eq!(shutter.state(), ShutterState::Open);
        assert_eq!(laser.history(), vec!["gam?", "glc?"]);
        assert_eq!(laser.register("guv"), record);
        assert_eq!(laser.register("glc").as_deref(), Some("50.0"));
    }

    #[test]
    fn test_resync_reads_slot() {
        let laser = SimulatedLaser::new();
        let mut d = dispatcher(&laser);
        let slot = RestorePoint::Device(DeviceSlot::new("guv?", "suv"));
        let mut shutter = ShutterEmulation::incarnate(&mut d, commands(), slot).unwrap();
        assert_eq!(shutter.state(), ShutterState::Open);

        laser.set_register("guv", "MM[0;1;50.0]");
        assert_eq!(shutter.resync(&mut d).unwrap(), ShutterState::Closed);
    }

    #[test]
    fn test_is_unsupported() {
        assert!(is_unsupported(&LaserError::UnsupportedCommand {
            command: "guv?".into(),
            reply: "Syntax error".into()
        }));
        assert!(!is_unsupported(&LaserError::ReadOnly("x".into())));
    }
}
