//! Type inference for textual result cells
//!
//! Cells are classified in a fixed order: integer first, then float, then
//! string. A cell that parses as an integer is never reported as a float.
//!
//! The integer grammar accepts base prefixes (`0x`, `0o`, `0b`, or a bare
//! leading `0` for octal) and `_` digit separators. The float
//! grammar is whatever `f64::from_str` accepts, except that a finite
//! literal too large for `f64` (such as `1e500`) stays a string.

use crate::types::ColumnValue;

/// Classify a raw cell
///
/// ```
/// use rivven_sqlbeat::infer::infer;
/// use rivven_sqlbeat::ColumnValue;
///
/// assert_eq!(infer("42"), ColumnValue::Integer(42));
/// assert_eq!(infer("0x1f"), ColumnValue::Integer(31));
/// assert_eq!(infer("4.5"), ColumnValue::Float(4.5));
/// assert_eq!(infer("ON"), ColumnValue::String("ON".into()));
/// assert_eq!(infer(""), ColumnValue::String(String::new()));
/// ```
pub fn infer(raw: &str) -> ColumnValue {
    if let Some(n) = parse_integer(raw) {
        return ColumnValue::Integer(n);
    }
    if let Some(f) = parse_float(raw) {
        return ColumnValue::Float(f);
    }
    ColumnValue::String(raw.to_owned())
}

/// Parse a 64-bit float, rejecting finite literals that overflow
///
/// `inf`, `infinity` and `nan` (any case, optional sign) stay accepted.
fn parse_float(raw: &str) -> Option<f64> {
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() || is_non_finite_literal(raw) {
        Some(f)
    } else {
        None
    }
}

fn is_non_finite_literal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    ["inf", "infinity", "nan"]
        .iter()
        .any(|lit| unsigned.eq_ignore_ascii_case(lit))
}

/// Parse a signed 64-bit integer with base-prefix detection
///
/// Returns `None` for empty input, malformed digits, misplaced separators,
/// or values outside the `i64` range.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let (negative, unsigned) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let (radix, digits) = split_radix(unsigned)?;

    if digits.contains('_') && !separators_ok(unsigned) {
        return None;
    }

    let mut magnitude: u64 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix)?;
        magnitude = magnitude
            .checked_mul(u64::from(radix))?
            .checked_add(u64::from(d))?;
        seen_digit = true;
    }
    if !seen_digit {
        return None;
    }

    let value = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(value).ok()
}

/// Split an unsigned literal into (radix, digits)
fn split_radix(s: &str) -> Option<(u32, &str)> {
    if s.is_empty() {
        return None;
    }
    let bytes = s.as_bytes();
    if bytes[0] != b'0' || s.len() == 1 {
        return Some((10, s));
    }
    match bytes[1] {
        b'x' | b'X' => Some((16, &s[2..])),
        b'o' | b'O' => Some((8, &s[2..])),
        b'b' | b'B' => Some((2, &s[2..])),
        _ => Some((8, &s[1..])),
    }
}

/// Each `_` must follow a digit or a letter base prefix, and none may trail
fn separators_ok(unsigned: &str) -> bool {
    let bytes = unsigned.as_bytes();
    let mut start = 0;
    let mut last = b'^';
    if bytes.len() >= 2
        && bytes[0] == b'0'
        && matches!(bytes[1].to_ascii_lowercase(), b'b' | b'o' | b'x')
    {
        start = 2;
        last = b'0';
    }
    for &c in &bytes[start..] {
        last = match c {
            b'_' if last != b'0' => return false,
            b'_' => b'_',
            c if c.is_ascii_alphanumeric() => b'0',
            _ => b'!',
        };
    }
    last != b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_integers() {
        assert_eq!(parse_integer("0"), Some(0));
        assert_eq!(parse_integer("-17"), Some(-17));
        assert_eq!(parse_integer("+17"), Some(17));
        assert_eq!(parse_integer("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn test_prefixed_integers() {
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("0o17"), Some(15));
        assert_eq!(parse_integer("017"), Some(15));
        assert_eq!(parse_integer("-0x10"), Some(-16));
    }

    #[test]
    fn test_separators() {
        assert_eq!(parse_integer("0x_ff_ff"), Some(0xffff));
        assert_eq!(parse_integer("1_000"), Some(1000));
        assert_eq!(parse_integer("0_7"), Some(7));
        assert_eq!(parse_integer("_1"), None);
        assert_eq!(parse_integer("0x1__0"), None);
        assert_eq!(parse_integer("0x10_"), None);
    }

    #[test]
    fn test_rejected_integers() {
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("08"), None);
        assert_eq!(parse_integer(" 1"), None);
        assert_eq!(parse_integer("0x-1"), None);
        assert_eq!(parse_integer("9223372036854775808"), None);
    }

    #[test]
    fn test_infer_precedence() {
        assert_eq!(infer("100"), ColumnValue::Integer(100));
        assert_eq!(infer("1e3"), ColumnValue::Float(1000.0));
        assert_eq!(infer("08"), ColumnValue::Float(8.0));
        assert_eq!(
            infer("9223372036854775808"),
            ColumnValue::Float(9_223_372_036_854_775_808.0)
        );
        assert_eq!(infer("Yes"), ColumnValue::String("Yes".into()));
        assert_eq!(infer(""), ColumnValue::String(String::new()));
    }
}
