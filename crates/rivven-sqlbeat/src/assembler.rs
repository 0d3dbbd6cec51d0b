//! Row-to-event assembly
//!
//! One strategy per query mode:
//! - **SingleRow**: every column of the first row becomes a field
//! - **TwoColumns**: each row is a `(name, value)` pair in one shared event
//! - **MultipleRows**: each row becomes its own event, no delta tracking
//! - **ScalarExtract**: one configured column of the first row, as an integer
//!
//! Columns whose name ends with the delta marker are routed through the
//! `DeltaTracker` in the modes where `QueryMode::tracks_deltas` holds.

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::delta::DeltaTracker;
use crate::dispatcher::QueryMode;
use crate::infer::{infer, parse_integer};
use crate::types::{ColumnValue, Event};

/// Default suffix marking counter columns
pub const DEFAULT_DELTA_MARKER: &str = "__DELTA";

/// Default column extracted by the scalar strategy
pub const DEFAULT_SCALAR_COLUMN: &str = "Seconds_Behind_Master";

/// Per-row state the assembler needs besides the row itself
pub struct RowContext<'t> {
    /// Delta registry shared by every query of the process
    pub tracker: &'t mut DeltaTracker,
    /// Observation time for delta computations
    pub observed_at: DateTime<Utc>,
    /// Position of the query in the configured list
    pub query_index: usize,
}

/// Turns result rows into event fields
#[derive(Debug, Clone)]
pub struct RowAssembler {
    delta_marker: String,
    scalar_column: String,
    namespace_by_query: bool,
}

impl Default for RowAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA_MARKER, DEFAULT_SCALAR_COLUMN)
    }
}

impl RowAssembler {
    /// Create an assembler
    pub fn new(delta_marker: impl Into<String>, scalar_column: impl Into<String>) -> Self {
        Self {
            delta_marker: delta_marker.into(),
            scalar_column: scalar_column.into(),
            namespace_by_query: false,
        }
    }

    /// Keep a separate delta baseline per query instead of per column name
    pub fn with_namespace_by_query(mut self, enabled: bool) -> Self {
        self.namespace_by_query = enabled;
        self
    }

    /// Suffix marking counter columns
    pub fn delta_marker(&self) -> &str {
        &self.delta_marker
    }

    /// Column extracted by the scalar strategy
    pub fn scalar_column(&self) -> &str {
        &self.scalar_column
    }

    /// Whether a field name carries the delta marker
    #[inline]
    pub fn is_delta(&self, name: &str) -> bool {
        name.ends_with(&self.delta_marker)
    }

    /// Registry key for a delta field
    pub fn delta_key<'n>(&self, query_index: usize, name: &'n str) -> Cow<'n, str> {
        if self.namespace_by_query {
            Cow::Owned(format!("q{}/{}", query_index, name))
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Feed one row into `event` according to `mode`
    ///
    /// SingleRow and TwoColumns rows accumulate into a shared event; the
    /// caller hands each MultipleRows row a fresh event of its own.
    pub fn assemble(
        &self,
        mode: QueryMode,
        columns: &[String],
        row: &[String],
        event: &mut Event,
        ctx: &mut RowContext<'_>,
    ) {
        match mode {
            QueryMode::SingleRow | QueryMode::MultipleRows => {
                self.columns_row(mode, columns, row, event, ctx)
            }
            QueryMode::TwoColumns => {
                self.pair(mode, row, event, ctx);
            }
            QueryMode::ScalarExtract => self.scalar(columns, row, event),
        }
    }

    /// Every column of the row becomes a field
    fn columns_row(
        &self,
        mode: QueryMode,
        columns: &[String],
        row: &[String],
        event: &mut Event,
        ctx: &mut RowContext<'_>,
    ) {
        if columns.len() != row.len() {
            debug!(
                columns = columns.len(),
                cells = row.len(),
                "row width differs from column count"
            );
        }
        for (name, raw) in columns.iter().zip(row) {
            self.put_field(mode, event, name, raw, ctx);
        }
    }

    /// First cell names the field, second cell is its value
    ///
    /// Returns `false` when the row has fewer than two cells.
    fn pair(
        &self,
        mode: QueryMode,
        row: &[String],
        event: &mut Event,
        ctx: &mut RowContext<'_>,
    ) -> bool {
        let [name, raw, ..] = row else {
            warn!(
                query = ctx.query_index,
                cells = row.len(),
                "two-columns row needs a name and a value, skipping"
            );
            return false;
        };
        self.put_field(mode, event, name, raw, ctx);
        true
    }

    /// Only the configured column, parsed as an integer
    fn scalar(&self, columns: &[String], row: &[String], event: &mut Event) {
        let Some(idx) = columns.iter().position(|c| *c == self.scalar_column) else {
            debug!(column = %self.scalar_column, "scalar column not in result");
            return;
        };
        match row.get(idx).and_then(|raw| parse_integer(raw)) {
            Some(n) => event.insert(self.scalar_column.as_str(), ColumnValue::Integer(n)),
            None => debug!(column = %self.scalar_column, "scalar column not an integer, omitted"),
        }
    }

    fn put_field(
        &self,
        mode: QueryMode,
        event: &mut Event,
        name: &str,
        raw: &str,
        ctx: &mut RowContext<'_>,
    ) {
        let value = infer(raw);
        if !mode.tracks_deltas() || !self.is_delta(name) {
            event.insert(name, value);
            return;
        }

        let key = self.delta_key(ctx.query_index, name);
        if let Some(rate) = ctx.tracker.observe(&key, value, ctx.observed_at) {
            event.insert(name, rate);
        }
    }
}
