//! Report download.
//!
//! Reports can be tens of MB, so the HTTP client carries a total-request
//! timeout on the order of minutes rather than seconds. The fetcher is a
//! trait so refresh cycles can be driven by a fixture in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use ipdex_core::registry::RegistryDescriptor;
use ipdex_core::{Error, Result};

/// Fetches a registry's raw delegated-stats report.
#[async_trait]
pub trait ReportFetcher: Send + Sync + 'static {
    /// Downloads the latest report for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on timeout, connection failure, or a
    /// non-success HTTP status.
    async fn fetch(&self, descriptor: &RegistryDescriptor) -> Result<Bytes>;
}

/// The production fetcher, backed by a pooled HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher with the given total-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] when the client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::network_with_source("building http client", err))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReportFetcher for HttpFetcher {
    async fn fetch(&self, descriptor: &RegistryDescriptor) -> Result<Bytes> {
        let url = descriptor.report_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::network_with_source(format!("GET {url}"), err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!("GET {url}: status {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|err| Error::network_with_source(format!("reading body of {url}"), err))
    }
}
