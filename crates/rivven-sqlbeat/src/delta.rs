//! Rate tracking for counter columns
//!
//! A `DeltaTracker` remembers the last value and observation time of every
//! delta key it has seen, and turns each new observation into a per-second
//! rate. It is an owned registry: whoever drives the poll loop holds it and
//! threads it through every cycle.
//!
//! Rules:
//! - First numeric observation of a key seeds the baseline and yields nothing
//! - Integer rates are rounded half-up, float rates are reported raw
//! - A value that did not grow (counter reset or idle) yields zero
//! - A string value is passed through unchanged and never touches a baseline
//! - A type change against the baseline yields nothing and keeps the baseline
//! - A non-positive elapsed time yields nothing and refreshes the baseline

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::types::ColumnValue;

/// Last observation of a delta key
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Last observed value
    pub value: ColumnValue,
    /// When it was observed
    pub observed_at: DateTime<Utc>,
}

/// Registry of delta baselines keyed by column identity
#[derive(Debug, Default)]
pub struct DeltaTracker {
    baselines: HashMap<String, Baseline>,
}

impl DeltaTracker {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and compute the rate since the previous one
    pub fn observe(
        &mut self,
        key: &str,
        value: ColumnValue,
        at: DateTime<Utc>,
    ) -> Option<ColumnValue> {
        if let ColumnValue::String(_) = value {
            return Some(value);
        }

        let Some(baseline) = self.baselines.get_mut(key) else {
            trace!(key, "seeding delta baseline");
            self.baselines.insert(
                key.to_owned(),
                Baseline {
                    value,
                    observed_at: at,
                },
            );
            return None;
        };

        if !baseline.value.same_type(&value) {
            debug!(
                key,
                baseline = baseline.value.type_name(),
                observed = value.type_name(),
                "delta type mismatch, skipping"
            );
            return None;
        }

        let elapsed = elapsed_seconds(baseline.observed_at, at);
        let rate = if elapsed > 0.0 {
            rate(&baseline.value, &value, elapsed)
        } else {
            debug!(key, elapsed, "non-positive elapsed time, no rate");
            None
        };

        *baseline = Baseline {
            value,
            observed_at: at,
        };
        rate
    }

    /// Get the baseline for a key
    pub fn baseline(&self, key: &str) -> Option<&Baseline> {
        self.baselines.get(key)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    /// Whether no key has been observed yet
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    /// Forget every baseline
    pub fn reset(&mut self) {
        self.baselines.clear();
    }
}

/// Per-second rate between two values of the same numeric type
fn rate(old: &ColumnValue, new: &ColumnValue, elapsed: f64) -> Option<ColumnValue> {
    match (old, new) {
        (ColumnValue::Integer(old), ColumnValue::Integer(new)) => {
            if new > old {
                let grown = new.abs_diff(*old) as f64;
                Some(ColumnValue::Integer(round_half_up(grown / elapsed)))
            } else {
                Some(ColumnValue::Integer(0))
            }
        }
        (ColumnValue::Float(old), ColumnValue::Float(new)) => {
            if new > old {
                Some(ColumnValue::Float((new - old) / elapsed))
            } else {
                Some(ColumnValue::Float(0.0))
            }
        }
        _ => None,
    }
}

/// Round to the nearest integer, ties toward positive infinity
///
/// ```
/// use rivven_sqlbeat::delta::round_half_up;
///
/// assert_eq!(round_half_up(2.5), 3);
/// assert_eq!(round_half_up(2.4999), 2);
/// ```
pub fn round_half_up(x: f64) -> i64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        x.ceil() as i64
    } else {
        floor as i64
    }
}

/// Seconds from `from` to `to` as a float (negative if `to` is earlier)
fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}
