//! The storage contract behind the double-buffered range tables.
//!
//! This module defines the contract every storage backend must implement:
//! - Option persistence for scheduler bookkeeping
//! - Existence-based active-table resolution over a fixed table pair
//! - Transactional per-partition snapshot loading with an atomic swap
//! - Point containment lookup against the active table
//!
//! ## Double buffering
//!
//! Exactly one of the two fixed tables exists at any instant and serves all
//! reads. A reload writes the inactive table and makes it the sole existing
//! one on commit, so readers never observe a table mid-truncate. Each
//! registry owns a disjoint partition keyed by registry id:
//! [`RangeStore::load_snapshot`] replaces one partition and carries every
//! other registry's rows forward from the active table inside the same
//! transaction. This keeps refresh loops for distinct registries fully
//! independent of one another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::record::IpRangeRecord;
use crate::registry::RegistryId;

/// One of the two fixed buffer tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTable {
    /// The `ip_ranges_a` table.
    A,
    /// The `ip_ranges_b` table.
    B,
}

impl BufferTable {
    /// Returns the persistent table name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::A => "ip_ranges_a",
            Self::B => "ip_ranges_b",
        }
    }

    /// Returns the other table of the pair.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for BufferTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage contract for the range store.
///
/// All backends (SQL deployments, the in-memory store) implement this trait.
/// Connection pooling, SQL dialect, and read snapshot isolation are backend
/// concerns; the contract only fixes the observable semantics.
#[async_trait]
pub trait RangeStore: Send + Sync + 'static {
    /// Opens the backend connection.
    async fn start_up(&self) -> Result<()>;

    /// Closes the backend connection. Idempotent.
    async fn shut_down(&self) -> Result<()>;

    /// Reads a scalar option value.
    ///
    /// Returns `None` when the key has never been written.
    async fn get_option(&self, key: &str) -> Result<Option<String>>;

    /// Writes a scalar option value, replacing any previous one.
    async fn set_option(&self, key: &str, value: &str) -> Result<()>;

    /// Resolves which buffer table currently serves reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] unless exactly one of the two
    /// tables exists.
    async fn resolve_active_table(&self) -> Result<BufferTable>;

    /// Replaces `registry`'s partition with `records` inside one transaction.
    ///
    /// Every other registry's rows are carried forward from the active
    /// table, and `target` becomes the sole active table on commit. On any
    /// failure the transaction rolls back in full: the target's prior
    /// contents and the active-table resolution are unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when `target` is the active table,
    /// and [`Error::Storage`] for backend failures.
    async fn load_snapshot(
        &self,
        target: BufferTable,
        registry: RegistryId,
        records: Vec<IpRangeRecord>,
    ) -> Result<()>;

    /// Finds the range containing `address` in the active table.
    ///
    /// A miss is a normal outcome, not an error.
    async fn query(&self, address: IpAddr) -> Result<Option<IpRangeRecord>>;
}

/// The storage backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// The in-tree in-memory store (tests and debug deployments).
    #[default]
    Memory,
    /// An external SQL deployment.
    Postgres,
}

impl std::str::FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => Err(Error::InvalidInput(format!(
                "unknown storage backend: {other}"
            ))),
        }
    }
}

/// Constructs the configured storage backend.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the selected backend is not
/// compiled into this build.
pub fn make_store(kind: StorageKind) -> Result<std::sync::Arc<dyn RangeStore>> {
    match kind {
        StorageKind::Memory => Ok(std::sync::Arc::new(MemoryStore::new())),
        StorageKind::Postgres => Err(Error::InvalidInput(
            "postgres storage backend is not compiled into this build".to_string(),
        )),
    }
}

/// In-memory range store for tests and debug deployments.
///
/// Thread-safe via `RwLock`; a table's presence in the map is its
/// existence. Not suitable for production: no durability, single process.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<BufferTable, Vec<IpRangeRecord>>,
    options: HashMap<String, String>,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("lock poisoned")
}

impl MemoryStore {
    /// Creates a store in its steady state: table A exists and is empty.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tables(&[BufferTable::A])
    }

    /// Creates a store with an explicit set of existing tables.
    ///
    /// Zero or two tables produce the inconsistent states the resolution
    /// contract must reject; tests use this to exercise them.
    #[must_use]
    pub fn with_tables(tables: &[BufferTable]) -> Self {
        let mut state = MemoryState::default();
        for table in tables {
            state.tables.insert(*table, Vec::new());
        }
        Self {
            state: RwLock::new(state),
        }
    }

    fn resolve_in(state: &MemoryState) -> Result<BufferTable> {
        let a = state.tables.contains_key(&BufferTable::A);
        let b = state.tables.contains_key(&BufferTable::B);
        match (a, b) {
            (true, false) => Ok(BufferTable::A),
            (false, true) => Ok(BufferTable::B),
            (true, true) => Err(Error::inconsistent_state(
                "both buffer tables exist; cannot tell which is active",
            )),
            (false, false) => Err(Error::inconsistent_state(
                "neither buffer table exists; storage was never initialized",
            )),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RangeStore for MemoryStore {
    async fn start_up(&self) -> Result<()> {
        Ok(())
    }

    async fn shut_down(&self) -> Result<()> {
        Ok(())
    }

    async fn get_option(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.options.get(key).cloned())
    }

    async fn set_option(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.options.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn resolve_active_table(&self) -> Result<BufferTable> {
        let state = self.state.read().map_err(poison_err)?;
        Self::resolve_in(&state)
    }

    async fn load_snapshot(
        &self,
        target: BufferTable,
        registry: RegistryId,
        records: Vec<IpRangeRecord>,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let active = Self::resolve_in(&state)?;
        if target == active {
            return Err(Error::InvalidInput(format!(
                "load target {target} is the active table"
            )));
        }

        // All-or-nothing under the write lock: build the full row set first,
        // then swap table existence in one mutation.
        let mut rows: Vec<IpRangeRecord> = state
            .tables
            .get(&active)
            .map(|current| {
                current
                    .iter()
                    .filter(|row| row.registry != registry)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.extend(records);

        state.tables.insert(target, rows);
        state.tables.remove(&active);
        Ok(())
    }

    async fn query(&self, address: IpAddr) -> Result<Option<IpRangeRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        let active = Self::resolve_in(&state)?;
        let rows = state
            .tables
            .get(&active)
            .ok_or_else(|| Error::internal("active table vanished under read lock"))?;
        Ok(rows.iter().find(|row| row.contains(address)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::end_of_range_v4;
    use crate::record::{IpVersion, RangeStatus};
    use crate::registry::find_by_tag;
    use std::net::Ipv4Addr;

    fn record(tag: &str, start: Ipv4Addr, count: u32) -> IpRangeRecord {
        IpRangeRecord {
            registry: find_by_tag(tag).expect("catalog tag").id,
            country_code: "ZZ".to_string(),
            ip_version: IpVersion::V4,
            start: start.into(),
            end: end_of_range_v4(start, count).expect("in range").into(),
            quantity: u64::from(count),
            status: RangeStatus::Allocated,
            status_changed_at: None,
        }
    }

    #[tokio::test]
    async fn steady_state_resolves_to_the_sole_table() {
        let store = MemoryStore::new();
        assert_eq!(
            store.resolve_active_table().await.expect("one table"),
            BufferTable::A
        );
    }

    #[tokio::test]
    async fn zero_or_two_tables_is_inconsistent() {
        let none = MemoryStore::with_tables(&[]);
        let err = none.resolve_active_table().await.expect_err("no tables");
        assert!(matches!(err, Error::InconsistentState { .. }));

        let both = MemoryStore::with_tables(&[BufferTable::A, BufferTable::B]);
        let err = both.resolve_active_table().await.expect_err("two tables");
        assert!(matches!(err, Error::InconsistentState { .. }));
    }

    #[tokio::test]
    async fn load_swaps_the_active_table() {
        let store = MemoryStore::new();
        let apnic = find_by_tag("apnic").expect("apnic").id;

        let rows = vec![record("apnic", Ipv4Addr::new(1, 0, 0, 0), 256)];
        store
            .load_snapshot(BufferTable::B, apnic, rows)
            .await
            .expect("load");

        assert_eq!(
            store.resolve_active_table().await.expect("one table"),
            BufferTable::B
        );
        let hit = store
            .query("1.0.0.17".parse().expect("addr"))
            .await
            .expect("query")
            .expect("containment hit");
        assert_eq!(hit.registry, apnic);
    }

    #[tokio::test]
    async fn load_carries_other_partitions_forward() {
        let store = MemoryStore::new();
        let apnic = find_by_tag("apnic").expect("apnic").id;
        let ripencc = find_by_tag("ripencc").expect("ripencc").id;

        store
            .load_snapshot(
                BufferTable::B,
                apnic,
                vec![record("apnic", Ipv4Addr::new(1, 0, 0, 0), 256)],
            )
            .await
            .expect("load apnic");
        store
            .load_snapshot(
                BufferTable::A,
                ripencc,
                vec![record("ripencc", Ipv4Addr::new(2, 0, 0, 0), 1024)],
            )
            .await
            .expect("load ripencc");

        // Both partitions are now served from table A.
        let apnic_hit = store
            .query("1.0.0.200".parse().expect("addr"))
            .await
            .expect("query")
            .expect("apnic row survived the ripencc load");
        assert_eq!(apnic_hit.registry, apnic);
        let ripencc_hit = store
            .query("2.0.3.255".parse().expect("addr"))
            .await
            .expect("query")
            .expect("ripencc hit");
        assert_eq!(ripencc_hit.registry, ripencc);
    }

    #[tokio::test]
    async fn reload_replaces_only_its_own_partition() {
        let store = MemoryStore::new();
        let apnic = find_by_tag("apnic").expect("apnic").id;

        store
            .load_snapshot(
                BufferTable::B,
                apnic,
                vec![record("apnic", Ipv4Addr::new(1, 0, 0, 0), 256)],
            )
            .await
            .expect("first load");
        store
            .load_snapshot(
                BufferTable::A,
                apnic,
                vec![record("apnic", Ipv4Addr::new(5, 0, 0, 0), 256)],
            )
            .await
            .expect("second load");

        assert!(store
            .query("1.0.0.1".parse().expect("addr"))
            .await
            .expect("query")
            .is_none());
        assert!(store
            .query("5.0.0.1".parse().expect("addr"))
            .await
            .expect("query")
            .is_some());
    }

    #[tokio::test]
    async fn failed_load_changes_nothing() {
        let store = MemoryStore::new();
        let apnic = find_by_tag("apnic").expect("apnic").id;

        store
            .load_snapshot(
                BufferTable::B,
                apnic,
                vec![record("apnic", Ipv4Addr::new(1, 0, 0, 0), 256)],
            )
            .await
            .expect("load");

        // Targeting the active table violates the contract and must leave
        // both contents and resolution untouched.
        let err = store
            .load_snapshot(
                BufferTable::B,
                apnic,
                vec![record("apnic", Ipv4Addr::new(9, 0, 0, 0), 16)],
            )
            .await
            .expect_err("active table as target");
        assert!(matches!(err, Error::InvalidInput(_)));

        assert_eq!(
            store.resolve_active_table().await.expect("unchanged"),
            BufferTable::B
        );
        assert!(store
            .query("1.0.0.1".parse().expect("addr"))
            .await
            .expect("query")
            .is_some());
        assert!(store
            .query("9.0.0.1".parse().expect("addr"))
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn options_round_trip() {
        let store = MemoryStore::new();
        assert!(store
            .get_option("lastUpdateapnic")
            .await
            .expect("get")
            .is_none());
        store
            .set_option("lastUpdateapnic", "2026-08-06 04:00:05")
            .await
            .expect("set");
        assert_eq!(
            store
                .get_option("lastUpdateapnic")
                .await
                .expect("get")
                .as_deref(),
            Some("2026-08-06 04:00:05")
        );
    }
}
