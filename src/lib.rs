//! Remote control of serial-attached lasers.
//!
//! Each instrument attribute is exposed as a named, typed, independently
//! cached and validated [`Property`]. Firmware without a native emission pause
//! gets an emulated shutter that parks the laser at zero current and restores
//! the previous operating point, remembering it in the device's persisted
//! string slot.
//!
//! # Modules
//!
//! - `port`: serial transport, mock port and simulated laser
//! - `dispatcher`: command framing and reply classification
//! - `error`: error taxonomy
//! - `property`, `enumeration`, `constraint`: the property model
//! - `persisted`, `shutter`: persisted-state codec and shutter emulation
//! - `models`: per-model property tables
//! - `laser`: the aggregate tying it together
//! - `gui`: boundary with the host's data-binding layer
//! - `config`: TOML configuration with environment overrides
//!
//! # Example
//!
//! ```rust
//! use laser_remote::{CommandDispatcher, Laser, LaserModel, ShutterPersistence, SimulatedLaser};
//!
//! let device = SimulatedLaser::new();
//! let dispatcher = CommandDispatcher::new(Box::new(device.port("SIM")));
//! let mut laser = Laser::incarnate(LaserModel::Series06, dispatcher, ShutterPersistence::Device)?;
//!
//! laser.set("Shutter", "closed")?;
//! assert_eq!(laser.get("Current Setpoint [mA]")?, "0");
//! assert_eq!(device.register("guv").as_deref(), Some("MM[0;1;50.0]"));
//! # Ok::<(), laser_remote::LaserError>(())
//! ```

pub mod config;
pub mod constraint;
pub mod dispatcher;
pub mod enumeration;
pub mod error;
pub mod gui;
pub mod laser;
pub mod models;
pub mod persisted;
pub mod port;
pub mod property;
pub mod shutter;

pub use constraint::{Constraint, ConstraintSpec};
pub use dispatcher::CommandDispatcher;
pub use enumeration::{EnumerationItem, EnumerationTable, StateEntry, StateTable};
pub use error::{ErrorKind, LaserError, LaserResult};
pub use gui::{AllowedValuesRegistry, GuiEnvironment, GuiError};
pub use laser::{Laser, SharedLaser};
pub use models::{LaserModel, ShutterPersistence};
pub use persisted::{DeviceSlot, PersistedLaserState};
pub use port::{
    DataBits, FlowControl, MockSerialPort, Parity, PortConfiguration, PortError,
    SerialPortAdapter, SimulatedLaser, StopBits, SyncSerialPort,
};
pub use property::{Property, PropertyKind, Stereotype};
pub use shutter::{RestorePoint, ShutterCommands, ShutterEmulation, ShutterState, StatusGate};

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
