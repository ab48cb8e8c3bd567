//! Observability infrastructure for ipdex.
//!
//! Structured logging with consistent spans: the updater wraps each refresh
//! cycle in a span carrying the registry tag, the API wraps each lookup in
//! a span carrying the queried address.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `ipdex_updater=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one registry refresh cycle.
#[must_use]
pub fn refresh_span(registry: &str) -> Span {
    tracing::info_span!("refresh", registry = registry)
}

/// Creates a span for one point lookup.
#[must_use]
pub fn lookup_span(address: &str) -> Span {
    tracing::info_span!("lookup", address = address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn span_helpers_create_enterable_spans() {
        let span = refresh_span("apnic");
        let _guard = span.enter();
        tracing::info!("refresh message in span");

        let span = lookup_span("1.0.0.1");
        let _guard = span.enter();
        tracing::info!("lookup message in span");
    }
}
