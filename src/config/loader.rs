//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "LASER_REMOTE";

/// Config file name
const CONFIG_FILE_NAME: &str = "laser-remote.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "LASER_REMOTE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `LASER_REMOTE_CONFIG` environment variable (explicit path)
    /// 2. `./laser-remote.toml` (current directory)
    /// 3. The platform config directory (`~/.config/laser-remote/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides, no file.
    pub fn with_defaults() -> ConfigResult<Self> {
        let mut config = Config::default();
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: None,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoSavePath)?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this application.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "laser-remote").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Where `--write-default-config` writes when no path is given.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{ENV_PREFIX}_{key}");
    std::env::var(&var).ok().map(|value| (var, value))
}

fn parse_env<T>(var: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::env_parse(var, e.to_string()))
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `LASER_REMOTE_<SECTION>_<KEY>`, for example
/// `LASER_REMOTE_SERIAL_PORT=/dev/ttyUSB0` or `LASER_REMOTE_LASER_MODEL=skyra`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some((_, val)) = env_var("SERIAL_PORT") {
        config.serial.port = Some(val);
    }
    if let Some((var, val)) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_env(&var, &val)?;
    }
    if let Some((var, val)) = env_var("SERIAL_TIMEOUT_MS") {
        config.serial.timeout_ms = parse_env(&var, &val)?;
    }

    if let Some((var, val)) = env_var("LASER_MODEL") {
        config.laser.model = parse_env(&var, &val)?;
    }
    if let Some((var, val)) = env_var("LASER_SHUTTER_PERSISTENCE") {
        config.laser.shutter_persistence = parse_env(&var, &val)?;
    }

    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::models::{LaserModel, ShutterPersistence};
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults().unwrap();
        assert_eq!(loader.config().serial.baud_rate, 115200);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("LASER_REMOTE_SERIAL_BAUD_RATE", "9600");
        env::set_var("LASER_REMOTE_LASER_MODEL", "08-series");

        let loader = ConfigLoader::with_defaults().unwrap();
        assert_eq!(loader.config().serial.baud_rate, 9600);
        assert_eq!(loader.config().laser.model, LaserModel::Series08);

        env::remove_var("LASER_REMOTE_SERIAL_BAUD_RATE");
        env::remove_var("LASER_REMOTE_LASER_MODEL");
    }

    #[test]
    #[serial]
    fn test_bad_env_value() {
        env::set_var("LASER_REMOTE_LASER_SHUTTER_PERSISTENCE", "disk");

        let err = ConfigLoader::with_defaults().unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));

        env::remove_var("LASER_REMOTE_LASER_SHUTTER_PERSISTENCE");
    }

    #[test]
    #[serial]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut loader = ConfigLoader::with_defaults().unwrap();
        loader.config_mut().laser.shutter_persistence = ShutterPersistence::Device;
        loader.config_mut().logging.format = LogFormat::Json;
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(reloaded.config(), loader.config());
        assert_eq!(reloaded.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_explicit_path_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[laser]\nmodel = \"skyra\"\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config().laser.model, LaserModel::Skyra);

        env::remove_var(CONFIG_PATH_ENV);
    }

    #[test]
    #[serial]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ConfigLoader::load_from(&missing),
            Err(ConfigError::NotFound(_))
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[serial\nport = ").unwrap();
        assert!(matches!(
            ConfigLoader::load_from(&broken),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_save_without_path() {
        let loader = ConfigLoader::with_defaults().unwrap();
        assert!(matches!(loader.save(), Err(ConfigError::NoSavePath)));
    }
}
