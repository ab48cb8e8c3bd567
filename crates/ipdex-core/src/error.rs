//! Error types and result aliases for ipdex.
//!
//! This module defines the shared error types used across all ipdex
//! components. Errors are structured for programmatic handling: a refresh
//! worker decides retry behavior from the variant alone, and the API layer
//! maps variants to HTTP statuses without string matching.

use std::net::IpAddr;

/// The result type used throughout ipdex.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ipdex operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A report line named a registry the catalog does not know.
    ///
    /// This signals a stale catalog, not a transient fault.
    #[error("unknown registry tag: {tag}")]
    UnknownRegistry {
        /// The tag as it appeared in the report.
        tag: String,
    },

    /// A report line carried a record type that is neither `ipv4` nor `ipv6`.
    #[error("unknown ip version token: {token}")]
    UnknownIpVersion {
        /// The record-type token as it appeared in the report.
        token: String,
    },

    /// A report line violated the delegated-stats structure.
    #[error("malformed record: {message}")]
    MalformedRecord {
        /// Description of the violation.
        message: String,
    },

    /// A start address failed to parse or contradicted its record type.
    #[error("malformed address '{literal}': {message}")]
    MalformedAddress {
        /// The address literal as it appeared in the report.
        literal: String,
        /// Description of the failure.
        message: String,
    },

    /// A status-changed date was present but not a valid `YYYYMMDD` value.
    #[error("malformed date: {value}")]
    MalformedDate {
        /// The date field as it appeared in the report.
        value: String,
    },

    /// A range end would exceed the address family's numeric space.
    #[error("address range overflow: start {start} + {quantity} addresses")]
    AddressOverflow {
        /// The range start address.
        start: IpAddr,
        /// The address count that overflowed.
        quantity: u64,
    },

    /// A download failed: timeout, connection failure, or non-success status.
    #[error("network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The buffer table pair is in an impossible state (zero or two active).
    ///
    /// This requires operator intervention and must never be guessed around.
    #[error("inconsistent state: {message}")]
    InconsistentState {
        /// Description of the inconsistency.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new network error with the given message.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new network error with a source cause.
    #[must_use]
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new malformed-record error.
    #[must_use]
    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    /// Creates a new inconsistent-state error.
    #[must_use]
    pub fn inconsistent_state(message: impl Into<String>) -> Self {
        Self::InconsistentState {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true when the error is fatal for the whole process rather
    /// than a single refresh cycle.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InconsistentState { .. })
    }
}
