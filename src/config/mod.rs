//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the first of:
//!
//! 1. `LASER_REMOTE_CONFIG` environment variable (explicit path)
//! 2. `./laser-remote.toml` (current directory)
//! 3. `laser-remote.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `LASER_REMOTE_<SECTION>_<KEY>`:
//! - `LASER_REMOTE_SERIAL_PORT=/dev/ttyUSB0`
//! - `LASER_REMOTE_SERIAL_BAUD_RATE=115200`
//! - `LASER_REMOTE_SERIAL_TIMEOUT_MS=500`
//! - `LASER_REMOTE_LASER_MODEL=skyra`
//! - `LASER_REMOTE_LASER_SHUTTER_PERSISTENCE=volatile`
//! - `LASER_REMOTE_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use laser_remote::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("model: {}", config.laser.model);
//! println!("baud: {}", config.serial.baud_rate);
//! # Ok::<(), laser_remote::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LaserConfig, LogFormat, LoggingConfig, SerialConfig};
