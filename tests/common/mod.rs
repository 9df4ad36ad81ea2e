//! Shared test utilities for the laser integration tests.
//!
//! - Simulated lasers wired to a dispatcher with a short reply timeout
//! - Scripted mock ports for reply-classification tests
//! - Builders for a fully incarnated `Laser`

#![allow(dead_code)]

use laser_remote::{
    CommandDispatcher, Laser, LaserModel, MockSerialPort, ShutterPersistence, SimulatedLaser,
};
use std::time::Duration;

/// Short enough that silent-device tests stay fast.
pub const TEST_REPLY_TIMEOUT: Duration = Duration::from_millis(50);

/// Dispatcher talking to `device`.
pub fn dispatcher_for(device: &SimulatedLaser) -> CommandDispatcher {
    CommandDispatcher::new(Box::new(device.port("SIM0"))).with_reply_timeout(TEST_REPLY_TIMEOUT)
}

/// Dispatcher over a mock port that answers every command with `reply`.
pub fn dispatcher_replying(reply: &'static str) -> (MockSerialPort, CommandDispatcher) {
    let port = MockSerialPort::with_responder("MOCK0", move |_| Some(reply.to_string()));
    let dispatcher =
        CommandDispatcher::new(Box::new(port.clone())).with_reply_timeout(TEST_REPLY_TIMEOUT);
    (port, dispatcher)
}

/// Incarnate `model` on `device`, panicking on failure.
pub fn laser_on(
    device: &SimulatedLaser,
    model: LaserModel,
    persistence: ShutterPersistence,
) -> Laser {
    Laser::incarnate(model, dispatcher_for(device), persistence)
        .unwrap_or_else(|e| panic!("incarnating {model} failed: {e}"))
}

/// A 06-series laser with its shutter persisted on the device.
pub fn persisted_laser() -> (SimulatedLaser, Laser) {
    let device = SimulatedLaser::new();
    let laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Device);
    (device, laser)
}

/// Commands the device received after `skip` earlier ones.
pub fn history_since(device: &SimulatedLaser, skip: usize) -> Vec<String> {
    device.history().into_iter().skip(skip).collect()
}
