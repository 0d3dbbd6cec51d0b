//! Tests for rivven-sqlbeat type inference

use rivven_sqlbeat::infer::{infer, parse_integer};
use rivven_sqlbeat::ColumnValue;

// ==================== Integer Tests ====================

#[test]
fn test_status_counters_are_integers() {
    for (raw, expected) in [("0", 0), ("3600", 3600), ("-1", -1), ("18446744", 18_446_744)] {
        assert_eq!(infer(raw), ColumnValue::Integer(expected), "cell {:?}", raw);
    }
}

#[test]
fn test_integer_wins_over_float() {
    assert!(matches!(infer("10"), ColumnValue::Integer(10)));
    assert!(matches!(infer("0x10"), ColumnValue::Integer(16)));
}

#[test]
fn test_out_of_range_integer_falls_back_to_float() {
    assert_eq!(parse_integer("18446744073709551615"), None);
    assert!(matches!(infer("18446744073709551615"), ColumnValue::Float(_)));
}

// ==================== Float Tests ====================

#[test]
fn test_decimal_cells_are_floats() {
    assert_eq!(infer("0.25"), ColumnValue::Float(0.25));
    assert_eq!(infer("-3.5"), ColumnValue::Float(-3.5));
    assert_eq!(infer("2.5e-3"), ColumnValue::Float(0.0025));
}

#[test]
fn test_overflowing_float_stays_string() {
    assert_eq!(infer("1e500"), ColumnValue::String("1e500".into()));
    assert_eq!(infer("-1e500"), ColumnValue::String("-1e500".into()));
    assert_eq!(infer("1e-500"), ColumnValue::Float(0.0));
}

#[test]
fn test_infinity_and_nan_literals_are_floats() {
    assert_eq!(infer("inf"), ColumnValue::Float(f64::INFINITY));
    assert_eq!(infer("-Infinity"), ColumnValue::Float(f64::NEG_INFINITY));
    assert!(matches!(infer("NaN"), ColumnValue::Float(f) if f.is_nan()));
}

// ==================== String Tests ====================

#[test]
fn test_text_cells_are_strings() {
    assert_eq!(infer("ON"), ColumnValue::String("ON".into()));
    assert_eq!(infer("8.0.36-log"), ColumnValue::String("8.0.36-log".into()));
    assert_eq!(infer("1.2.3"), ColumnValue::String("1.2.3".into()));
}

#[test]
fn test_null_cell_is_empty_string() {
    assert_eq!(infer(""), ColumnValue::String(String::new()));
}

#[test]
fn test_padded_cells_are_not_trimmed() {
    assert_eq!(infer(" 42"), ColumnValue::String(" 42".into()));
}
