//! # ipdex-core
//!
//! Core types and contracts for the ipdex delegated-stats service.
//!
//! This crate provides the foundational pieces shared by the updater and
//! the API:
//!
//! - **Registry Catalog**: Static descriptors of the five regional registries
//! - **Record Model**: The typed IP-range record the parser produces
//! - **Range Arithmetic**: Pure end-of-range computation for both families
//! - **Storage Contract**: The double-buffered table store and option store
//! - **Cache Contract**: The cache-aside seam for the read path
//! - **Error Types**: Shared error definitions and result type
//!
//! ## Crate Boundary
//!
//! `ipdex-core` is the only crate allowed to define shared primitives. The
//! updater and API crates interact with storage exclusively through the
//! contracts defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod cache;
pub mod error;
pub mod observability;
pub mod range;
pub mod record;
pub mod registry;
pub mod storage;

pub use cache::{make_cache, CacheKind, MemoryCache, RangeCache};
pub use error::{Error, Result};
pub use range::{end_of_range_v4, end_of_range_v6};
pub use record::{IpRangeRecord, IpVersion, RangeStatus};
pub use registry::{find_by_tag, RegistryDescriptor, RegistryId, REGISTRIES};
pub use storage::{make_store, BufferTable, MemoryStore, RangeStore, StorageKind};
