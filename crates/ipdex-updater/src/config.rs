//! Updater configuration.
//!
//! Loaded from `IPDEX_`-prefixed environment variables; every knob has a
//! default suitable for a debug deployment.

use chrono::NaiveTime;
use std::time::Duration;

use ipdex_core::observability::LogFormat;
use ipdex_core::{Error, Result, StorageKind};

use crate::worker::RefreshSchedule;

/// Configuration for the updater process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log output format.
    pub log_format: LogFormat,
    /// Storage backend selection.
    pub storage: StorageKind,
    /// Total-request timeout for report downloads.
    pub download_timeout: Duration,
    /// Refresh loop timing.
    pub schedule: RefreshSchedule,
    /// How long shutdown waits for workers before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            storage: StorageKind::Memory,
            download_timeout: Duration::from_secs(600),
            schedule: RefreshSchedule::default(),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IPDEX_LOG_FORMAT`: `json` or `pretty`
    /// - `IPDEX_STORAGE_BACKEND`: `memory` or `postgres`
    /// - `IPDEX_DOWNLOAD_TIMEOUT_SECS`
    /// - `IPDEX_REFRESH_INTERVAL_HOURS`
    /// - `IPDEX_RETRY_PAUSE_SECS`
    /// - `IPDEX_DAILY_REFRESH_UTC`: `HH:MM:SS`
    /// - `IPDEX_SHUTDOWN_GRACE_SECS`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unparseable values.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(format) = env_string("IPDEX_LOG_FORMAT") {
            config.log_format = parse_log_format(&format)?;
        }
        if let Some(backend) = env_string("IPDEX_STORAGE_BACKEND") {
            config.storage = backend.parse()?;
        }
        if let Some(secs) = env_u64("IPDEX_DOWNLOAD_TIMEOUT_SECS")? {
            config.download_timeout = Duration::from_secs(secs);
        }
        if let Some(hours) = env_u64("IPDEX_REFRESH_INTERVAL_HOURS")? {
            config.schedule.refresh_interval = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(secs) = env_u64("IPDEX_RETRY_PAUSE_SECS")? {
            config.schedule.retry_pause = Duration::from_secs(secs);
        }
        if let Some(time) = env_string("IPDEX_DAILY_REFRESH_UTC") {
            config.schedule.daily_refresh_at = NaiveTime::parse_from_str(&time, "%H:%M:%S")
                .map_err(|_| {
                    Error::InvalidInput(format!(
                        "IPDEX_DAILY_REFRESH_UTC must be HH:MM:SS, got {time}"
                    ))
                })?;
        }
        if let Some(secs) = env_u64("IPDEX_SHUTDOWN_GRACE_SECS")? {
            config.shutdown_grace = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Parses a log-format token.
pub(crate) fn parse_log_format(value: &str) -> Result<LogFormat> {
    match value {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        other => Err(Error::InvalidInput(format!(
            "log format must be json or pretty, got {other}"
        ))),
    }
}

/// Reads a non-empty string variable.
pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Reads an unsigned integer variable.
pub(crate) fn env_u64(name: &str) -> Result<Option<u64>> {
    match env_string(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("{name} must be an unsigned integer, got {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_deployment() {
        let config = Config::default();
        assert_eq!(config.download_timeout, Duration::from_secs(600));
        assert_eq!(config.schedule.refresh_interval, Duration::from_secs(86_400));
        assert_eq!(config.schedule.retry_pause, Duration::from_secs(1_800));
        assert_eq!(config.storage, StorageKind::Memory);
    }

    #[test]
    fn log_format_tokens() {
        assert_eq!(parse_log_format("json").expect("json"), LogFormat::Json);
        assert_eq!(parse_log_format("pretty").expect("pretty"), LogFormat::Pretty);
        assert!(parse_log_format("syslog").is_err());
    }
}
