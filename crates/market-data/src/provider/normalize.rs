//! Normalization helpers for upstream payloads.
//!
//! Upstreams report numbers as formatted strings (`"$1,234.50"`, `"₹ 2,950"`,
//! `"+1.23%"`), as floats, or not at all. These helpers turn them into
//! `Decimal`/`u64` and never coerce a missing value to zero.

use std::str::FromStr;

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Decimal places used for percent changes.
const PERCENT_DP: u32 = 2;

/// Placeholders upstreams use for "no value".
const EMPTY_MARKERS: &[&str] = &["", "-", "--", "N/A", "NA", "null", "None"];

fn clean_numeric(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    for prefix in ["Rs.", "Rs", "INR", "USD"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
        }
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '₹' | ',' | '%' | '+' | ' ' | '\u{a0}'))
        .collect();

    if EMPTY_MARKERS.iter().any(|m| cleaned.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(cleaned)
    }
}

/// Parse a formatted price string.
///
/// Strips currency symbols (`$`, `₹`, `Rs.`), thousands separators, plus
/// signs and whitespace. Returns `None` for placeholders or garbage.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned = clean_numeric(raw)?;
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parse a formatted percentage such as `"+1.23%"` or `"-0.5"`.
pub fn parse_percent(raw: &str) -> Option<Decimal> {
    parse_price(raw).map(|p| p.round_dp(PERCENT_DP))
}

/// Parse a volume such as `"12,345,678"` or `"1234.0"`.
pub fn parse_volume(raw: &str) -> Option<u64> {
    let cleaned = clean_numeric(raw)?;
    cleaned.parse::<u64>().ok().or_else(|| {
        Decimal::from_str(&cleaned)
            .ok()
            .filter(|d| !d.is_sign_negative())
            .and_then(|d| d.trunc().to_u64())
    })
}

/// Convert an upstream float. Non-finite values become `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if value.is_finite() {
        Decimal::from_f64(value)
    } else {
        None
    }
}

/// Percent change from `previous` to `current`, rounded to 2 dp.
///
/// `None` when there is no usable previous close.
pub fn percent_change(current: Decimal, previous: Option<Decimal>) -> Option<Decimal> {
    let previous = previous.filter(|p| !p.is_zero())?;
    Some(((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(PERCENT_DP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("$1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_price("₹ 2,950.10"), Some(dec!(2950.10)));
        assert_eq!(parse_price("Rs. 101"), Some(dec!(101)));
        assert_eq!(parse_price("  42 "), Some(dec!(42)));
        assert_eq!(parse_price("-3.5"), Some(dec!(-3.5)));
    }

    #[test]
    fn test_parse_price_placeholders() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("--"), None);
        assert_eq!(parse_price("abc"), None);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("+1.234%"), Some(dec!(1.23)));
        assert_eq!(parse_percent("-0.5%"), Some(dec!(-0.5)));
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("12,345,678"), Some(12_345_678));
        assert_eq!(parse_volume("1234.0"), Some(1234));
        assert_eq!(parse_volume("N/A"), None);
        assert_eq!(parse_volume("-5"), None);
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal_from_f64(150.25), Some(dec!(150.25)));
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(dec!(110), Some(dec!(100))), Some(dec!(10.00)));
        assert_eq!(percent_change(dec!(99), Some(dec!(100))), Some(dec!(-1.00)));
        assert_eq!(percent_change(dec!(1), Some(dec!(3))), Some(dec!(-66.67)));
        assert_eq!(percent_change(dec!(100), Some(Decimal::ZERO)), None);
        assert_eq!(percent_change(dec!(100), None), None);
    }
}
