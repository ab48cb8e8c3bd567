//! Delegated-stats report parsing.
//!
//! The report format is plaintext, pipe-delimited: one version/summary
//! line, three fixed summary lines, then one data line per allocation:
//!
//! ```text
//! registryTag|countryCode|recordType|startAddress|count|date|status[|extra]
//! ```
//!
//! [`parse_report`] yields a lazy, finite, single-pass iterator over the
//! typed records. The iterator is consumed by value; re-parsing requires a
//! fresh body. `asn` lines are not address ranges and are skipped, as are
//! blank and `#`-comment lines anywhere in the body.

use chrono::NaiveDate;
use std::net::IpAddr;
use std::str::Lines;

use ipdex_core::{
    end_of_range_v4, end_of_range_v6, find_by_tag, Error, IpRangeRecord, IpVersion, RangeStatus,
    Result,
};

/// The `YYYYMMDD` date format status-changed values use.
const REPORT_DATE_FORMAT: &str = "%Y%m%d";

/// Parses a report body into a record iterator.
#[must_use]
pub fn parse_report(body: &str) -> RecordIter<'_> {
    RecordIter {
        lines: body.lines(),
        header_done: false,
    }
}

/// Lazy iterator over the records of one report.
#[derive(Debug)]
pub struct RecordIter<'a> {
    lines: Lines<'a>,
    header_done: bool,
}

impl RecordIter<'_> {
    /// Consumes the version/summary line (skipping leading blanks and
    /// comments) and the three fixed per-type summary lines.
    fn skip_header(&mut self) {
        for line in self.lines.by_ref() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            break;
        }
        for _ in 0..3 {
            if self.lines.next().is_none() {
                break;
            }
        }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<IpRangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.header_done {
            self.skip_header();
            self.header_done = true;
        }
        loop {
            let line = self.lines.next()?.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Parses one data line. Returns `Ok(None)` for `asn` lines.
fn parse_line(line: &str) -> Result<Option<IpRangeRecord>> {
    let mut fields = line.split('|');
    let (Some(tag), Some(country), Some(record_type), Some(start), Some(count), Some(date), Some(status)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(Error::malformed_record(format!(
            "expected at least 7 fields: {line}"
        )));
    };

    if record_type == "asn" {
        return Ok(None);
    }

    let registry = find_by_tag(tag)?.id;
    let ip_version = IpVersion::from_token(record_type)?;

    let quantity: u64 = count.parse().map_err(|_| {
        Error::malformed_record(format!("address count '{count}' is not an unsigned integer"))
    })?;
    if quantity == 0 {
        return Err(Error::malformed_record(format!(
            "address count must be greater than zero: {line}"
        )));
    }

    let start_addr: IpAddr = start.parse().map_err(|_| Error::MalformedAddress {
        literal: start.to_string(),
        message: "not an IP literal".to_string(),
    })?;

    let end_addr: IpAddr = match (ip_version, start_addr) {
        (IpVersion::V4, IpAddr::V4(v4)) => {
            let count32 = u32::try_from(quantity).map_err(|_| Error::AddressOverflow {
                start: start_addr,
                quantity,
            })?;
            end_of_range_v4(v4, count32)?.into()
        }
        (IpVersion::V6, IpAddr::V6(v6)) => end_of_range_v6(v6, quantity)?.into(),
        _ => {
            return Err(Error::MalformedAddress {
                literal: start.to_string(),
                message: format!("address family does not match record type '{record_type}'"),
            })
        }
    };

    let status_changed_at = if date.is_empty() {
        None
    } else {
        Some(
            NaiveDate::parse_from_str(date, REPORT_DATE_FORMAT).map_err(|_| {
                Error::MalformedDate {
                    value: date.to_string(),
                }
            })?,
        )
    };

    let status = RangeStatus::from_token(status).unwrap_or_else(|| {
        tracing::warn!(status = status, line = line, "unknown status token");
        RangeStatus::Unknown
    });

    Ok(Some(IpRangeRecord {
        registry,
        country_code: country.to_string(),
        ip_version,
        start: start_addr,
        end: end_addr,
        quantity,
        status,
        status_changed_at,
    }))
}
