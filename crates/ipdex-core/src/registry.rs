//! The registry source catalog.
//!
//! Five regional registries publish delegated-stats reports. The catalog is
//! a fixed, ordered set of descriptors created once at process start: each
//! entry carries the tag that opens every data line of that registry's
//! report plus the components of its download URL.
//!
//! Tags resolve through [`find_by_tag`]; a tag that appears in a downloaded
//! report but matches no entry means the catalog is stale, which is an
//! [`Error::UnknownRegistry`] and not a transient fault.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// A strongly-typed index into the registry catalog.
///
/// Ids are only handed out by the catalog itself, so an id always points
/// at a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RegistryId(u8);

impl RegistryId {
    /// Returns the descriptor this id points at.
    #[must_use]
    pub fn descriptor(self) -> &'static RegistryDescriptor {
        &REGISTRIES[usize::from(self.0)]
    }

    /// Returns the registry tag, e.g. `apnic`.
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.descriptor().tag
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An immutable descriptor of one regional registry.
#[derive(Debug)]
pub struct RegistryDescriptor {
    /// The catalog id of this registry.
    pub id: RegistryId,
    /// The tag that opens every data line of this registry's report.
    pub tag: &'static str,
    /// The `ftp.<domain>.net` host component of the report URL.
    domain: &'static str,
    /// The stats directory component of the report URL.
    path: &'static str,
    /// The `delegated-<file>-latest` stem of the report URL.
    file_stem: &'static str,
}

impl RegistryDescriptor {
    const fn new(
        index: u8,
        tag: &'static str,
        domain: &'static str,
        path: &'static str,
        file_stem: &'static str,
    ) -> Self {
        Self {
            id: RegistryId(index),
            tag,
            domain,
            path,
            file_stem,
        }
    }

    /// Returns the URL of this registry's latest delegated-stats report.
    #[must_use]
    pub fn report_url(&self) -> String {
        format!(
            "https://ftp.{}.net/pub/stats/{}/delegated-{}-latest",
            self.domain, self.path, self.file_stem
        )
    }

    /// Returns the option-store key holding this registry's last successful
    /// update timestamp.
    #[must_use]
    pub fn last_update_key(&self) -> String {
        format!("lastUpdate{}", self.tag)
    }
}

/// The fixed registry catalog, in the order the original deployment used.
///
/// ARIN publishes under the `arin-extended` file stem and RIPE NCC serves
/// from `ftp.ripe.net` while tagging lines `ripencc`; the remaining three
/// use their tag for every component.
pub static REGISTRIES: [RegistryDescriptor; 5] = [
    RegistryDescriptor::new(0, "arin", "arin", "arin", "arin-extended"),
    RegistryDescriptor::new(1, "apnic", "apnic", "apnic", "apnic"),
    RegistryDescriptor::new(2, "afrinic", "afrinic", "afrinic", "afrinic"),
    RegistryDescriptor::new(3, "lacnic", "lacnic", "lacnic", "lacnic"),
    RegistryDescriptor::new(4, "ripencc", "ripe", "ripencc", "ripencc"),
];

/// Resolves a report-line registry tag to its catalog descriptor.
///
/// # Errors
///
/// Returns [`Error::UnknownRegistry`] when the tag matches no entry.
pub fn find_by_tag(tag: &str) -> Result<&'static RegistryDescriptor> {
    REGISTRIES
        .iter()
        .find(|descriptor| descriptor.tag == tag)
        .ok_or_else(|| Error::UnknownRegistry {
            tag: tag.to_string(),
        })
}
