//! `ipdex-updater` binary entrypoint.
//!
//! Loads configuration from environment variables, spawns one refresh
//! worker per catalog registry, and drives a bounded graceful shutdown on
//! SIGINT.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use ipdex_core::observability::init_logging;
use ipdex_core::{make_store, REGISTRIES};
use ipdex_updater::config::Config;
use ipdex_updater::fetch::{HttpFetcher, ReportFetcher};
use ipdex_updater::worker::RegistryWorker;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(config.log_format);

    let store = make_store(config.storage)?;
    store.start_up().await?;

    let fetcher: Arc<dyn ReportFetcher> = Arc::new(HttpFetcher::new(config.download_timeout)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = JoinSet::new();
    for descriptor in &REGISTRIES {
        workers.spawn(
            RegistryWorker::new(
                descriptor,
                Arc::clone(&store),
                Arc::clone(&fetcher),
                config.schedule,
                shutdown_rx.clone(),
            )
            .run(),
        );
    }
    drop(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("received termination signal");
    let _ = shutdown_tx.send(true);

    // Workers finish their current stage naturally; don't wait forever.
    let drain = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "workers did not stop within the grace period; aborting"
        );
        workers.shutdown().await;
    }

    store.shut_down().await?;
    Ok(())
}
