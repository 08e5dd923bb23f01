//! Various utility functions.

use crate::types::Timestamp;
use rand::Rng;

/// Parses the leading integer of a string the way a lenient `parseInt` would: optional
/// whitespace, an optional sign and at least one decimal digit. Trailing characters are
/// ignored.
///
/// Returns `None` if the string does not start with a number.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Returns a random lowercase base 36 string of the given length.
pub fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Current wall clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Returns `value` if it is finite and not negative.
pub(crate) fn non_negative(field: &'static str, value: f64) -> crate::Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(crate::GridError::InvalidValue { field, value })
    }
}

/// Returns `value` if it is finite.
pub(crate) fn finite(field: &'static str, value: f64) -> crate::Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(crate::GridError::InvalidValue { field, value })
    }
}
