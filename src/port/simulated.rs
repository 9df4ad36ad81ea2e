//! In-process emulation of a Cobolt-style laser controller.
//!
//! The simulated device keeps a register file and speaks the same
//! line protocol as the hardware:
//!
//! - `<reg>?` replies with the register value,
//! - `<cmd> <arg>` writes `<cmd>` (or `g<rest>` for `s<rest>` setters) and replies `OK`,
//! - bare mode commands (`ci`, `cp`, `em`, `l0`, `l1`) switch run mode or emission,
//! - anything else replies `Syntax error: illegal command`.
//!
//! It is used by the integration tests and by `laser-ctl --simulate`.

use super::mock::MockSerialPort;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const SYNTAX_ERROR: &str = "Syntax error: illegal command";
const OK: &str = "OK";

/// Register that backs the generic persisted-string slot.
pub const USER_SLOT_REGISTER: &str = "guv";

#[derive(Debug)]
struct DeviceRegisters {
    registers: BTreeMap<String, String>,
    rejected: BTreeSet<String>,
    silent: bool,
    history: Vec<String>,
}

impl DeviceRegisters {
    fn factory_defaults() -> Self {
        let registers = [
            ("l", "1"),
            ("gom", "2"),
            ("gam", "1"),
            ("glc", "50.0"),
            ("gmlc", "150.0"),
            ("i", "49.8"),
            ("p", "0.0500"),
            ("gmlp", "0.0600"),
            ("pa", "0.0499"),
            ("gdmes", "0"),
            ("games", "0"),
            ("galis", "0"),
            ("gas", "1"),
            ("gsn", "20345"),
            ("gfv", "9.001"),
            ("glm", "06-01-0488-100"),
            ("hrs", "1532.21"),
            ("f", "0"),
            (USER_SLOT_REGISTER, ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            registers,
            rejected: BTreeSet::new(),
            silent: false,
            history: Vec::new(),
        }
    }

    fn handle(&mut self, line: &str) -> Option<String> {
        self.history.push(line.to_string());
        if self.silent {
            return None;
        }

        let line = line.trim();
        let (word, arg) = match line.split_once(' ') {
            Some((word, arg)) => (word, Some(arg.trim())),
            None => (line, None),
        };

        if self.rejected.contains(word) {
            return Some(SYNTAX_ERROR.to_string());
        }

        let reply = match arg {
            None => self.query_or_action(word),
            Some(arg) => self.write(word, arg),
        };
        Some(reply.unwrap_or_else(|| SYNTAX_ERROR.to_string()))
    }

    fn query_or_action(&mut self, word: &str) -> Option<String> {
        if let Some(register) = word.strip_suffix('?') {
            return self.registers.get(register).cloned();
        }

        let (register, value) = match word {
            "ci" => ("gam", "0"),
            "cp" => ("gam", "1"),
            "em" => ("gam", "2"),
            "l0" => {
                self.registers.insert("gom".into(), "0".into());
                ("l", "0")
            }
            "l1" => {
                self.registers.insert("gom".into(), "2".into());
                ("l", "1")
            }
            _ => return None,
        };
        self.registers.insert(register.into(), value.into());
        Some(OK.to_string())
    }

    fn write(&mut self, word: &str, arg: &str) -> Option<String> {
        let register = if self.registers.contains_key(word) {
            word.to_string()
        } else {
            let getter = format!("g{}", word.strip_prefix('s')?);
            if !self.registers.contains_key(&getter) {
                return None;
            }
            getter
        };
        self.registers.insert(register, arg.to_string());
        Some(OK.to_string())
    }
}

/// Handle on a simulated laser.
///
/// Cloning the handle shares the device; every port obtained from
/// [`SimulatedLaser::port`] talks to the same register file.
#[derive(Debug, Clone)]
pub struct SimulatedLaser {
    device: Arc<Mutex<DeviceRegisters>>,
}

impl Default for SimulatedLaser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLaser {
    /// A powered-on laser in constant power mode at 50 mA with an empty user slot.
    pub fn new() -> Self {
        Self {
            device: Arc::new(Mutex::new(DeviceRegisters::factory_defaults())),
        }
    }

    /// Firmware without the generic user slot: its commands are rejected.
    pub fn without_persistence_slot(self) -> Self {
        self.device.lock().registers.remove(USER_SLOT_REGISTER);
        self
    }

    /// A serial port wired to this device.
    pub fn port(&self, name: impl Into<String>) -> MockSerialPort {
        let device = Arc::clone(&self.device);
        MockSerialPort::with_responder(name, move |line| device.lock().handle(line))
    }

    pub fn register(&self, name: &str) -> Option<String> {
        self.device.lock().registers.get(name).cloned()
    }

    pub fn set_register(&self, name: &str, value: &str) {
        self.device
            .lock()
            .registers
            .insert(name.to_string(), value.to_string());
    }

    /// Make the device answer `command` (first word of the line) with a syntax error.
    pub fn reject(&self, command: &str) {
        self.device.lock().rejected.insert(command.to_string());
    }

    pub fn accept(&self, command: &str) {
        self.device.lock().rejected.remove(command);
    }

    /// Stop answering altogether, as a hung or unplugged controller would.
    pub fn set_silent(&self, silent: bool) {
        self.device.lock().silent = silent;
    }

    /// Every command line received, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.device.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.device.lock().history.clear();
    }
}
