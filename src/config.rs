//! Configuration for timers and the driver thread.
//!
//! Everything deserializes with `serde`; missing keys take their defaults
//! and unknown keys are rejected. With the `config-file` feature the types
//! load straight from TOML:
//!
//! ```toml
//! [timer]
//! duration = "250ms"
//! fire_mode = "release"
//! autostart = true
//!
//! [driver]
//! thread_name = "ui-timers"
//! max_park = "forever"
//! ```

use crate::error::Error;
use crate::time::FireMode;
use crate::types::WaitDuration;
use serde::Deserialize;
use thiserror::Error as ThisError;

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The file could not be read.
    #[error("config I/O error: {0}")]
    Io(String),
    /// A value was syntactically fine but unusable.
    #[error(transparent)]
    Invalid(#[from] Error),
}

/// Settings for one [`Timer`](crate::time::Timer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    /// Delay between a start and the fire. Required; `None` is rejected
    /// when the timer is built.
    pub duration: Option<WaitDuration>,
    /// What a fire does with the elapsed registration.
    pub fire_mode: FireMode,
    /// Start the timer as soon as it is built.
    pub autostart: bool,
}

impl TimerConfig {
    /// Creates a config with the given duration and defaults elsewhere.
    #[must_use]
    pub fn new(duration: impl Into<WaitDuration>) -> Self {
        Self {
            duration: Some(duration.into()),
            ..Self::default()
        }
    }

    /// Sets the fire mode.
    #[must_use]
    pub fn fire_mode(mut self, fire_mode: FireMode) -> Self {
        self.fire_mode = fire_mode;
        self
    }

    /// Sets whether the timer starts as soon as it is built.
    #[must_use]
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }
}

/// Settings for a [`DriverThread`](crate::time::DriverThread).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverThreadConfig {
    /// Name given to the spawned thread.
    pub thread_name: String,
    /// Longest the thread sleeps between passes. `forever` parks until the
    /// next deadline or the next arm.
    pub max_park: WaitDuration,
}

impl Default for DriverThreadConfig {
    fn default() -> Self {
        Self {
            thread_name: "countdown-driver".to_string(),
            max_park: WaitDuration::from_millis(250),
        }
    }
}

/// A combined document with optional `[timer]` and `[driver]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountdownConfig {
    /// Timer settings.
    pub timer: TimerConfig,
    /// Driver thread settings.
    pub driver: DriverThreadConfig,
}

#[cfg(feature = "config-file")]
mod file {
    use super::{ConfigError, CountdownConfig, DriverThreadConfig, TimerConfig};
    use serde::de::DeserializeOwned;
    use std::path::Path;

    fn parse<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        parse(&text)
    }

    macro_rules! toml_loaders {
        ($($ty:ty),*) => {$(
            impl $ty {
                /// Parses this config from a TOML document.
                ///
                /// # Errors
                ///
                /// [`ConfigError::Parse`] on malformed TOML, unknown keys, or
                /// bad values.
                pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
                    parse(text)
                }

                /// Reads and parses this config from a TOML file.
                ///
                /// # Errors
                ///
                /// [`ConfigError::Io`] if the file cannot be read, otherwise
                /// as [`from_toml_str`](Self::from_toml_str).
                pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
                    read(path.as_ref())
                }
            }
        )*};
    }

    toml_loaders!(TimerConfig, DriverThreadConfig, CountdownConfig);
}
