mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, SoundConfig, Theme, TimerConfig, UiConfig};
pub use database::{Database, SETUP_KEY};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `SETRUNNER_DATA_DIR` wins when set. Otherwise `~/.config/setrunner/`, or
/// `~/.config/setrunner-dev/` with `SETRUNNER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("SETRUNNER_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SETRUNNER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("setrunner-dev")
            } else {
                base_dir.join("setrunner")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
