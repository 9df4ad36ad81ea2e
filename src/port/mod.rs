//! Transport layer for the laser's serial link.
//!
//! Provides the `SerialPortAdapter` trait plus a hardware port, a scripted
//! mock and a simulated laser that all plug into the command dispatcher.

pub mod error;
pub mod mock;
pub mod simulated;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use simulated::SimulatedLaser;
pub use sync_port::SyncSerialPort;
pub use traits::*;
