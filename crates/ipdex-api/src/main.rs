//! `ipdex-api` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the configured
//! storage and cache backends, and serves the read API until SIGINT.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::Result;

use ipdex_api::config::Config;
use ipdex_api::server::Server;
use ipdex_core::observability::init_logging;
use ipdex_core::{make_cache, make_store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(config.log_format);

    let store = make_store(config.storage)?;
    let cache = make_cache(config.cache)?;
    store.start_up().await?;
    if let Err(err) = cache.start_up().await {
        store.shut_down().await?;
        return Err(err.into());
    }

    let result = Server::new(config, store.clone(), cache.clone()).serve().await;

    // Best-effort close of both backends, whatever the serve outcome.
    cache.shut_down().await?;
    store.shut_down().await?;
    result
}
