//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Sound cues (on/off, volume, optional external player)
//! - Colour theme of the terminal display
//! - Tick period of the session runner
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{CommandEmitter, Scaled, SilentEmitter, TerminalBell, ToneEmitter};

/// Accent palette for the progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Blue,
    Purple,
    Orange,
    Rose,
    #[default]
    Emerald,
}

impl Theme {
    pub const ALL: [Theme; 7] = [
        Theme::Light,
        Theme::Dark,
        Theme::Blue,
        Theme::Purple,
        Theme::Orange,
        Theme::Rose,
        Theme::Emerald,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Blue => "blue",
            Theme::Purple => "purple",
            Theme::Orange => "orange",
            Theme::Rose => "rose",
            Theme::Emerald => "emerald",
        }
    }

    /// ANSI SGR sequence for the accent colour.
    pub fn accent_ansi(&self) -> &'static str {
        match self {
            Theme::Light => "\x1b[30m",
            Theme::Dark => "\x1b[97m",
            Theme::Blue => "\x1b[34m",
            Theme::Purple => "\x1b[35m",
            Theme::Orange => "\x1b[33m",
            Theme::Rose => "\x1b[31m",
            Theme::Emerald => "\x1b[32m",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<_> = Theme::ALL.iter().map(Theme::as_str).collect();
                format!("unknown theme '{s}' (expected one of {})", names.join(", "))
            })
    }
}

/// Sound cue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 0..=100
    #[serde(default = "default_volume")]
    pub volume: u32,
    /// External player template. Uses the terminal bell when unset.
    /// Placeholders: `{frequency}`, `{duration}`, `{volume}`.
    #[serde(default)]
    pub command: Option<String>,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Wall-clock milliseconds per logical second.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

fn default_true() -> bool {
    true
}
fn default_volume() -> u32 {
    50
}
fn default_tick_ms() -> u64 {
    1000
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            command: None,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("'{value}' is not true or false")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("'{value}' is not a whole number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(unknown());
                    }
                    // Optional strings clear on an empty value.
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config file location.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing the defaults if no file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// defaults cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults if no file exists.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.check()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning the defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                serde_json::Value::Null => out.push((prefix.to_string(), String::new())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value is not valid for
    /// it. The config is left unchanged on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.check()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save to the data directory.
    ///
    /// # Errors
    /// See [`Config::apply`] and [`Config::save`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Overwrite the stored config with the defaults.
    ///
    /// # Errors
    /// Returns an error if the defaults cannot be written.
    pub fn reset() -> Result<Self, ConfigError> {
        let cfg = Self::default();
        cfg.save()?;
        Ok(cfg)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.sound.volume > 100 {
            return Err(ConfigError::InvalidValue {
                key: "sound.volume".into(),
                message: format!("{} is not between 0 and 100", self.sound.volume),
            });
        }
        if self.timer.tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.tick_ms".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Tone output matching the sound settings.
    pub fn tone_emitter(&self) -> Arc<dyn ToneEmitter> {
        if !self.sound.enabled || self.sound.volume == 0 {
            return Arc::new(SilentEmitter);
        }
        let inner: Box<dyn ToneEmitter> = match self.sound.command.as_deref() {
            Some(template) if !template.trim().is_empty() => {
                Box::new(CommandEmitter::new(template))
            }
            _ => Box::new(TerminalBell),
        };
        Arc::new(Scaled::new(inner, self.sound.volume))
    }
}
