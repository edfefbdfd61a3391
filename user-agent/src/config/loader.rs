// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads `persistmon.toml`, deserializes it into `RawConfig`, and converts
//! the text durations into a typed `Config`. A missing file is not an error:
//! every table has defaults.

use crate::agent_log;
use crate::config::model::{
    Config, ConfigError, MonitorConfig, RawConfig, RawMonitorConfig, RawRunConfig, RunConfig,
};
use log::Level;
use std::{fs, io, path::{Path, PathBuf}, time::Duration};

/// Load and convert the configuration at `path`.
/// Logs at DEBUG before reading and INFO on success.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    agent_log!(Level::Debug, "config", "Reading config from {:?}", path);
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            agent_log!(Level::Info, "config", "No config at {:?}; using defaults", path);
            return Ok(Config::default());
        }
        Err(e) => return Err(e.into()),
    };
    let cfg = parse(&txt)?;
    agent_log!(Level::Info, "config", "Loaded config from {:?}", path);
    Ok(cfg)
}

/// Parse configuration text.
pub fn parse(txt: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(txt)?;
    let cfg = Config {
        monitor: convert_monitor(raw.monitor)?,
        run: convert_run(raw.run)?,
        logging: raw.logging,
    };
    cfg.logging.level_filter()?;
    Ok(cfg)
}

fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(text.trim())
        .map_err(|e| ConfigError::InvalidDuration(text.to_owned(), e))
}

fn convert_monitor(raw: RawMonitorConfig) -> Result<MonitorConfig, ConfigError> {
    Ok(MonitorConfig {
        session_name: raw.session_name,
        channel_capacity: raw.channel_capacity.max(1),
        join_timeout: parse_duration(&raw.join_timeout)?,
    })
}

fn convert_run(raw: RawRunConfig) -> Result<RunConfig, ConfigError> {
    Ok(RunConfig {
        wait: parse_duration(&raw.wait)?,
        output: raw.output.map(PathBuf::from),
    })
}
