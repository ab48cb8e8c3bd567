//! Address-range arithmetic.
//!
//! A delegated-stats line gives a start address and an address count; the
//! end of the range is `start + count - 1` in the family's native numeric
//! width. Both functions here are pure and deterministic, which the
//! property tests rely on.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Computes the inclusive end of a 32-bit range.
///
/// # Errors
///
/// Returns [`Error::AddressOverflow`] when `start + count - 1` exceeds the
/// 32-bit space, and [`Error::InvalidInput`] for a zero count.
pub fn end_of_range_v4(start: Ipv4Addr, count: u32) -> Result<Ipv4Addr> {
    let span = count
        .checked_sub(1)
        .ok_or_else(|| Error::InvalidInput("address count must be greater than zero".to_string()))?;
    u32::from(start)
        .checked_add(span)
        .map(Ipv4Addr::from)
        .ok_or(Error::AddressOverflow {
            start: start.into(),
            quantity: u64::from(count),
        })
}

/// Computes the inclusive end of a 128-bit range.
///
/// The 16-byte address is treated as a big-endian unsigned integer; the sum
/// is re-encoded to the fixed 16-byte representation.
///
/// # Errors
///
/// Returns [`Error::AddressOverflow`] when `start + count - 1` exceeds the
/// 128-bit space, and [`Error::InvalidInput`] for a zero count.
pub fn end_of_range_v6(start: Ipv6Addr, count: u64) -> Result<Ipv6Addr> {
    let span = u128::from(
        count
            .checked_sub(1)
            .ok_or_else(|| Error::InvalidInput("address count must be greater than zero".to_string()))?,
    );
    u128::from(start)
        .checked_add(span)
        .map(Ipv6Addr::from)
        .ok_or(Error::AddressOverflow {
            start: start.into(),
            quantity: count,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_end_is_start_plus_count_minus_one() {
        let start = Ipv4Addr::new(1, 0, 0, 0);
        let end = end_of_range_v4(start, 256).expect("in range");
        assert_eq!(end, Ipv4Addr::new(1, 0, 0, 255));
    }

    #[test]
    fn v4_single_address_range() {
        let start = Ipv4Addr::new(192, 0, 2, 7);
        assert_eq!(end_of_range_v4(start, 1).expect("in range"), start);
    }

    #[test]
    fn v4_overflow_at_the_top_of_the_space() {
        let start = Ipv4Addr::new(255, 255, 255, 255);
        assert_eq!(end_of_range_v4(start, 1).expect("fits"), start);
        let err = end_of_range_v4(start, 2).expect_err("one past the end");
        assert!(matches!(err, Error::AddressOverflow { .. }));
    }

    #[test]
    fn v4_zero_count_is_rejected() {
        let err = end_of_range_v4(Ipv4Addr::new(10, 0, 0, 0), 0).expect_err("zero count");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn v6_end_spans_segment_boundaries() {
        let start: Ipv6Addr = "2001:db8::".parse().expect("addr");
        // A /32 delegation: 2^96 addresses does not fit u64, use a /96 span.
        let end = end_of_range_v6(start, 1 << 32).expect("in range");
        assert_eq!(end, "2001:db8::ffff:ffff".parse::<Ipv6Addr>().expect("addr"));
    }

    #[test]
    fn v6_overflow_at_the_top_of_the_space() {
        let start: Ipv6Addr = "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"
            .parse()
            .expect("addr");
        assert_eq!(end_of_range_v6(start, 1).expect("fits"), start);
        let err = end_of_range_v6(start, 2).expect_err("one past the end");
        assert!(matches!(err, Error::AddressOverflow { .. }));
    }

    #[test]
    fn v6_zero_count_is_rejected() {
        let start: Ipv6Addr = "2001:db8::".parse().expect("addr");
        let err = end_of_range_v6(start, 0).expect_err("zero count");
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
