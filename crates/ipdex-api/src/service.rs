//! The cache-aside lookup service.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

use ipdex_core::{IpRangeRecord, RangeCache, RangeStore, Result};

/// Read-side point lookups against the active range table.
///
/// Cache-aside: the cache is consulted first and populated on a store hit.
/// Cache failures degrade to store lookups instead of failing the request;
/// store failures are the caller's problem.
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn RangeStore>,
    cache: Arc<dyn RangeCache>,
}

impl LookupService {
    /// Creates a service over the given store and cache handles.
    #[must_use]
    pub fn new(store: Arc<dyn RangeStore>, cache: Arc<dyn RangeCache>) -> Self {
        Self { store, cache }
    }

    /// Finds the range owning `address`.
    ///
    /// Returns `Ok(None)` on a miss: a valid query for an undelegated
    /// address is a normal outcome.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the active table cannot be queried.
    pub async fn resolve(&self, address: IpAddr) -> Result<Option<IpRangeRecord>> {
        match self.cache.get(address).await {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => {}
            Err(err) => warn!(address = %address, error = %err, "cache read failed"),
        }

        let Some(record) = self.store.query(address).await? else {
            return Ok(None);
        };

        if let Err(err) = self.cache.put(address, record.clone()).await {
            warn!(address = %address, error = %err, "cache write failed");
        }
        Ok(Some(record))
    }
}
