//! The typed IP-range record produced by parsing.
//!
//! Records are transient: the parser creates them and the bulk loader
//! consumes them immediately. Only their fields are ever persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::registry::RegistryId;

/// The IP version of a delegated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// A 32-bit IPv4 range.
    V4,
    /// A 128-bit IPv6 range.
    V6,
}

impl IpVersion {
    /// Parses a delegated-stats record-type token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownIpVersion`] for any token other than
    /// `ipv4` or `ipv6`. (`asn` lines are skipped before this point.)
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "ipv4" => Ok(Self::V4),
            "ipv6" => Ok(Self::V6),
            _ => Err(Error::UnknownIpVersion {
                token: token.to_string(),
            }),
        }
    }

    /// Returns the report-format token for this version.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The allocation status of a delegated range.
///
/// Registries publish extension statuses beyond the canonical four, so an
/// unrecognized token maps to [`RangeStatus::Unknown`] instead of failing
/// the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeStatus {
    /// The range is allocated to an operator.
    Allocated,
    /// The range is assigned to an end user.
    Assigned,
    /// The range is available for future delegation.
    Available,
    /// The range is reserved by the registry.
    Reserved,
    /// The report carried a status token outside the canonical set.
    Unknown,
}

impl RangeStatus {
    /// Parses a status token from the canonical set.
    ///
    /// Returns `None` for extension tokens; the caller decides whether to
    /// log before mapping to [`RangeStatus::Unknown`].
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "allocated" => Some(Self::Allocated),
            "assigned" => Some(Self::Assigned),
            "available" => Some(Self::Available),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }

    /// Returns the canonical token for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allocated => "allocated",
            Self::Assigned => "assigned",
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delegated IP range.
///
/// Invariant: `end == start + quantity - 1` in the address family's native
/// numeric width. The range arithmetic in [`crate::range`] is the only
/// producer of `end`, so the invariant holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpRangeRecord {
    /// The registry that delegated the range.
    pub registry: RegistryId,
    /// ISO-2 country code, or empty when the report omits it.
    pub country_code: String,
    /// The address family of the range.
    pub ip_version: IpVersion,
    /// First address of the range.
    pub start: IpAddr,
    /// Last address of the range (inclusive).
    pub end: IpAddr,
    /// Number of addresses in the range, always > 0.
    pub quantity: u64,
    /// Allocation status.
    pub status: RangeStatus,
    /// Date the status last changed, when the report carried one.
    pub status_changed_at: Option<NaiveDate>,
}

impl IpRangeRecord {
    /// Returns true when `address` falls inside `[start, end]`.
    ///
    /// Addresses of the other family never match.
    #[must_use]
    pub fn contains(&self, address: IpAddr) -> bool {
        match (self.start, self.end, address) {
            (IpAddr::V4(start), IpAddr::V4(end), IpAddr::V4(addr)) => start <= addr && addr <= end,
            (IpAddr::V6(start), IpAddr::V6(end), IpAddr::V6(addr)) => start <= addr && addr <= end,
            _ => false,
        }
    }
}
