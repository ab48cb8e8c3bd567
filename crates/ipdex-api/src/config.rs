//! API server configuration.

use ipdex_core::observability::LogFormat;
use ipdex_core::{CacheKind, Error, Result, StorageKind};

/// Configuration for the api process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP listener binds on.
    pub http_port: u16,
    /// Log output format.
    pub log_format: LogFormat,
    /// Storage backend selection.
    pub storage: StorageKind,
    /// Cache backend selection.
    pub cache: CacheKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            log_format: LogFormat::Pretty,
            storage: StorageKind::Memory,
            cache: CacheKind::Memory,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IPDEX_HTTP_PORT`
    /// - `IPDEX_LOG_FORMAT`: `json` or `pretty`
    /// - `IPDEX_STORAGE_BACKEND`: `memory` or `postgres`
    /// - `IPDEX_CACHE_BACKEND`: `memory` or `valkey`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unparseable values.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_string("IPDEX_HTTP_PORT") {
            config.http_port = port.parse().map_err(|_| {
                Error::InvalidInput(format!("IPDEX_HTTP_PORT must be a port number, got {port}"))
            })?;
        }
        if let Some(format) = env_string("IPDEX_LOG_FORMAT") {
            config.log_format = match format.as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(Error::InvalidInput(format!(
                        "log format must be json or pretty, got {other}"
                    )))
                }
            };
        }
        if let Some(backend) = env_string("IPDEX_STORAGE_BACKEND") {
            config.storage = backend.parse()?;
        }
        if let Some(backend) = env_string("IPDEX_CACHE_BACKEND") {
            config.cache = backend.parse()?;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_the_debug_port() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.cache, CacheKind::Memory);
    }
}
