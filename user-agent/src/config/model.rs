// src/config/model.rs

use log::LevelFilter;
use serde::Deserialize;
use std::{path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

use crate::etw::SessionOptions;
use shared::constants::DEFAULT_SESSION_NAME;

/// Top-level runtime config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub monitor: MonitorConfig,
    pub run:     RunConfig,
}

/// Mirror of the whole TOML file; every table is optional
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)] pub logging: LoggingConfig,
    #[serde(default)] pub monitor: RawMonitorConfig,
    #[serde(default)] pub run:     RawRunConfig,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]                   pub enable: bool,
    #[serde(default)]                   pub file:   Option<String>,
    #[serde(default = "default_level")] pub level:  String,
}
fn default_level() -> String { "INFO".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

impl LoggingConfig {
    /// Parsed `level`; anything unknown is an error.
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))
    }

    pub fn file_name(&self) -> &str {
        self.file.as_deref().unwrap_or("persistmon.log")
    }
}

/// Raw `[monitor]` table, durations still as text
#[derive(Debug, Deserialize)]
pub struct RawMonitorConfig {
    #[serde(default = "default_session_name")]     pub session_name:     String,
    #[serde(default = "default_channel_capacity")] pub channel_capacity: usize,
    #[serde(default = "default_join_timeout")]     pub join_timeout:     String,
}
fn default_session_name() -> String { DEFAULT_SESSION_NAME.into() }
fn default_channel_capacity() -> usize { 65_536 }
fn default_join_timeout() -> String { "3s".into() }

impl Default for RawMonitorConfig {
    fn default() -> Self {
        Self {
            session_name:     default_session_name(),
            channel_capacity: default_channel_capacity(),
            join_timeout:     default_join_timeout(),
        }
    }
}

/// Raw `[run]` table
#[derive(Debug, Deserialize)]
pub struct RawRunConfig {
    #[serde(default = "default_wait")] pub wait:   String,
    #[serde(default)]                  pub output: Option<String>,
}
fn default_wait() -> String { "30s".into() }

impl Default for RawRunConfig {
    fn default() -> Self {
        Self { wait: default_wait(), output: None }
    }
}

/// Fully-typed `[monitor]` settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub session_name:     String,
    pub channel_capacity: usize,
    pub join_timeout:     Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            session_name:     default_session_name(),
            channel_capacity: default_channel_capacity(),
            join_timeout:     Duration::from_secs(3),
        }
    }
}

impl MonitorConfig {
    /// Controller options with the fixed settle delays.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            session_name:     self.session_name.clone(),
            channel_capacity: self.channel_capacity,
            join_timeout:     self.join_timeout,
            ..SessionOptions::default()
        }
    }
}

/// Fully-typed `[run]` settings for the driver binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub wait:   Duration,
    pub output: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { wait: Duration::from_secs(30), output: None }
    }
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, #[source] humantime::DurationError),

    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
