//! Transport-level abstraction for the laser's serial link.
//!
//! The `SerialPortAdapter` trait is the only thing the command dispatcher
//! knows about the wire, so a real port, a scripted mock and the in-process
//! simulated laser can be swapped freely.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Line settings used when opening a laser's port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub flow_control: FlowControl,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Timeout of a single read or write on the underlying port. The
    /// dispatcher's reply deadline is separate.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    /// 115200 8N1 without flow control, which is what Cobolt-style lasers ship with.
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }
}

/// A lowercase-serialized line setting that maps one-to-one onto the
/// `serialport` enum of the same name.
macro_rules! line_setting {
    ($(#[$doc:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl From<$name> for serialport::$name {
            fn from(setting: $name) -> Self {
                match setting {
                    $($name::$variant => serialport::$name::$variant),+
                }
            }
        }
    };
}

line_setting! {
    /// Data bits per character.
    DataBits { Five, Six, Seven, Eight }
}

line_setting! {
    FlowControl { None, Software, Hardware }
}

line_setting! {
    Parity { None, Odd, Even }
}

line_setting! {
    StopBits { One, Two }
}

/// Byte-level I/O with the instrument.
///
/// Implementations are synchronous and may block up to their configured
/// timeout. A read that finds nothing pending returns either
/// `PortError::Timeout` or an I/O error of kind `TimedOut`/`WouldBlock`; the
/// dispatcher treats all three as "no data yet" and enforces its own deadline.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the port, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read whatever is available into `buffer`, returning the byte count.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Name or path of the port, used in log spans.
    fn name(&self) -> &str;

    /// Discard unread input and unsent output.
    ///
    /// Called before every command so a stale reply from an earlier,
    /// timed-out exchange cannot be mistaken for the answer to the next one.
    fn clear_buffers(&mut self) -> Result<(), PortError>;
}
