//! The lookup cache contract.
//!
//! The read path is cache-aside: the lookup service checks here first and
//! populates on a store hit. Eviction policy belongs to the backend; the
//! in-memory implementation is a plain map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::record::IpRangeRecord;

/// Cache contract for resolved lookups, keyed by queried address.
#[async_trait]
pub trait RangeCache: Send + Sync + 'static {
    /// Opens the backend connection.
    async fn start_up(&self) -> Result<()>;

    /// Closes the backend connection. Idempotent.
    async fn shut_down(&self) -> Result<()>;

    /// Returns the cached record for `address`, if any.
    async fn get(&self, address: IpAddr) -> Result<Option<IpRangeRecord>>;

    /// Caches `record` under `address`.
    async fn put(&self, address: IpAddr, record: IpRangeRecord) -> Result<()>;
}

/// The cache backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKind {
    /// The in-tree in-memory cache (tests and debug deployments).
    #[default]
    Memory,
    /// An external valkey deployment.
    Valkey,
}

impl std::str::FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "valkey" => Ok(Self::Valkey),
            other => Err(Error::InvalidInput(format!("unknown cache backend: {other}"))),
        }
    }
}

/// Constructs the configured cache backend.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the selected backend is not
/// compiled into this build.
pub fn make_cache(kind: CacheKind) -> Result<std::sync::Arc<dyn RangeCache>> {
    match kind {
        CacheKind::Memory => Ok(std::sync::Arc::new(MemoryCache::new())),
        CacheKind::Valkey => Err(Error::InvalidInput(
            "valkey cache backend is not compiled into this build".to_string(),
        )),
    }
}

/// In-memory cache for tests and debug deployments.
///
/// Unbounded; a real deployment points the cache contract at an external
/// evicting store instead.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<IpAddr, IpRangeRecord>>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("lock poisoned")
}

impl MemoryCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RangeCache for MemoryCache {
    async fn start_up(&self) -> Result<()> {
        Ok(())
    }

    async fn shut_down(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, address: IpAddr) -> Result<Option<IpRangeRecord>> {
        let entries = self.entries.read().map_err(poison_err)?;
        Ok(entries.get(&address).cloned())
    }

    async fn put(&self, address: IpAddr, record: IpRangeRecord) -> Result<()> {
        let mut entries = self.entries.write().map_err(poison_err)?;
        entries.insert(address, record);
        Ok(())
    }
}
