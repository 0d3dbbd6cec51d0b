//! Query dispatch for one polling cycle
//!
//! Provides:
//! - QueryMode: the closed set of row-to-event strategies
//! - QueryDescriptor: query text paired with its mode
//! - Dispatcher: runs every query of a cycle in order and publishes events
//! - Per-query outcomes, cycle reports and cumulative statistics
//!
//! Each query is an independent unit of failure: a query that cannot be
//! executed, or whose cursor fails mid-stream, loses its events for this
//! cycle while the remaining queries still run.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{RowAssembler, RowContext};
use crate::clock::{Clock, SystemClock};
use crate::delta::DeltaTracker;
use crate::error::{Error, Result};
use crate::publisher::Publisher;
use crate::source::RowSource;
use crate::types::Event;

/// Default event kind tag
pub const DEFAULT_EVENT_KIND: &str = "sqlbeat";

/// How a query's result is turned into events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryMode {
    /// First row only; every column is a field
    #[serde(rename = "single-row")]
    SingleRow,
    /// Every row is a (name, value) pair of one shared event
    #[serde(rename = "two-columns")]
    TwoColumns,
    /// Every row is its own event
    #[serde(rename = "multiple-rows")]
    MultipleRows,
    /// First row only; one configured column as an integer
    #[serde(rename = "show-slave-delay", alias = "scalar")]
    ScalarExtract,
}

impl QueryMode {
    /// Configuration name of the mode
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleRow => "single-row",
            Self::TwoColumns => "two-columns",
            Self::MultipleRows => "multiple-rows",
            Self::ScalarExtract => "show-slave-delay",
        }
    }

    /// Whether the whole result set is consumed (otherwise only the first row)
    #[inline]
    pub const fn consumes_all_rows(self) -> bool {
        matches!(self, Self::TwoColumns | Self::MultipleRows)
    }

    /// Whether delta-marked columns are converted to rates
    #[inline]
    pub const fn tracks_deltas(self) -> bool {
        matches!(self, Self::SingleRow | Self::TwoColumns)
    }

    /// Whether each row is published on its own
    #[inline]
    pub const fn emits_per_row(self) -> bool {
        matches!(self, Self::MultipleRows)
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "single-row" => Ok(Self::SingleRow),
            "two-columns" => Ok(Self::TwoColumns),
            "multiple-rows" => Ok(Self::MultipleRows),
            "show-slave-delay" | "scalar" => Ok(Self::ScalarExtract),
            other => Err(Error::config(format!(
                "unknown query type '{}' (expected single-row, two-columns, multiple-rows or show-slave-delay)",
                other
            ))),
        }
    }
}

/// A configured query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// SQL text, executed verbatim
    pub text: String,
    /// Assembly strategy
    pub mode: QueryMode,
}

impl QueryDescriptor {
    /// Create a descriptor
    pub fn new(text: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            text: text.into(),
            mode,
        }
    }

    /// Pair query texts with modes by position
    ///
    /// Both lists must have the same, non-zero length.
    pub fn pair(queries: &[String], modes: &[QueryMode]) -> Result<Vec<Self>> {
        if queries.is_empty() {
            return Err(Error::config("there are no queries to execute"));
        }
        if queries.len() != modes.len() {
            return Err(Error::config(format!(
                "queries has {} entries but query_types has {} (each query needs a type at the same index)",
                queries.len(),
                modes.len()
            )));
        }
        Ok(queries
            .iter()
            .zip(modes)
            .map(|(text, mode)| Self::new(text.clone(), *mode))
            .collect())
    }
}

/// Lifecycle of one query within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Not yet executed
    Start,
    /// Executed, cursor open
    RowsOpen,
    /// Reading rows
    Consuming,
    /// Finished normally
    Closed,
    /// Execution or cursor failure
    Failed,
}

/// What happened to one query during a cycle
#[derive(Debug)]
pub struct QueryOutcome {
    /// Position in the configured list
    pub index: usize,
    /// Mode the query ran in
    pub mode: QueryMode,
    /// Final state
    pub state: QueryState,
    /// Rows read from the cursor
    pub rows: usize,
    /// Events handed to the publisher successfully
    pub events: usize,
    /// Events the publisher rejected
    pub publish_failures: usize,
    /// Execution or cursor error, if the query failed
    pub error: Option<Error>,
    /// Last publish error, if any
    pub publish_error: Option<Error>,
}

impl QueryOutcome {
    fn new(index: usize, mode: QueryMode) -> Self {
        Self {
            index,
            mode,
            state: QueryState::Start,
            rows: 0,
            events: 0,
            publish_failures: 0,
            error: None,
            publish_error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        self.state = QueryState::Failed;
        self.error = Some(error);
    }

    /// Whether the query failed to execute or stream
    pub fn is_failed(&self) -> bool {
        self.state == QueryState::Failed
    }
}

/// Result of one polling cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// One outcome per query that was started, in order
    pub outcomes: Vec<QueryOutcome>,
    /// Whether shutdown stopped the cycle before every query ran
    pub interrupted: bool,
}

impl CycleReport {
    /// Queries that failed to execute or stream
    pub fn failed_queries(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Events published successfully
    pub fn events_published(&self) -> usize {
        self.outcomes.iter().map(|o| o.events).sum()
    }

    /// Events the publisher rejected
    pub fn publish_failures(&self) -> usize {
        self.outcomes.iter().map(|o| o.publish_failures).sum()
    }

    /// Whether every query ran and every event was published
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.failed_queries() == 0 && self.publish_failures() == 0
    }
}

/// Dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherStats {
    /// Cycles run
    pub cycles: u64,
    /// Rows read across all queries
    pub rows_read: u64,
    /// Events published successfully
    pub events_published: u64,
    /// Queries that failed to execute or stream
    pub query_failures: u64,
    /// Events the publisher rejected
    pub publish_failures: u64,
}

/// Atomic dispatcher statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicDispatcherStats {
    pub cycles: AtomicU64,
    pub rows_read: AtomicU64,
    pub events_published: AtomicU64,
    pub query_failures: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl AtomicDispatcherStats {
    /// Record a finished cycle
    pub fn record_cycle(&self, report: &CycleReport) {
        let rows: usize = report.outcomes.iter().map(|o| o.rows).sum();
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.rows_read.fetch_add(rows as u64, Ordering::Relaxed);
        self.events_published
            .fetch_add(report.events_published() as u64, Ordering::Relaxed);
        self.query_failures
            .fetch_add(report.failed_queries() as u64, Ordering::Relaxed);
        self.publish_failures
            .fetch_add(report.publish_failures() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Runs the configured queries and publishes their events
///
/// Owns the delta registry, so baselines persist across cycles for as long
/// as the dispatcher lives. `run_cycle` takes `&mut self`: cycles cannot
/// overlap.
pub struct Dispatcher {
    queries: Vec<QueryDescriptor>,
    assembler: RowAssembler,
    tracker: DeltaTracker,
    clock: Arc<dyn Clock>,
    event_kind: String,
    stats: AtomicDispatcherStats,
}

impl Dispatcher {
    /// Create a dispatcher using the system clock
    pub fn new(queries: Vec<QueryDescriptor>, assembler: RowAssembler) -> Self {
        Self {
            queries,
            assembler,
            tracker: DeltaTracker::new(),
            clock: Arc::new(SystemClock),
            event_kind: DEFAULT_EVENT_KIND.to_string(),
            stats: AtomicDispatcherStats::default(),
        }
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the kind tag of emitted events
    pub fn with_event_kind(mut self, kind: impl Into<String>) -> Self {
        self.event_kind = kind.into();
        self
    }

    /// Configured queries
    pub fn queries(&self) -> &[QueryDescriptor] {
        &self.queries
    }

    /// Delta registry
    pub fn tracker(&self) -> &DeltaTracker {
        &self.tracker
    }

    /// Forget every delta baseline
    pub fn reset_deltas(&mut self) {
        self.tracker.reset();
    }

    /// Get statistics
    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }

    /// Run every query once, in order
    ///
    /// `shutdown` is checked between queries only, so a query is never cut
    /// off halfway through its rows.
    pub async fn run_cycle(
        &mut self,
        source: &dyn RowSource,
        publisher: &dyn Publisher,
        shutdown: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        let ctx = CycleContext {
            assembler: &self.assembler,
            clock: self.clock.as_ref(),
            kind: &self.event_kind,
            source,
            publisher,
        };

        for (index, query) in self.queries.iter().enumerate() {
            if shutdown.is_cancelled() {
                info!(query = index, "shutdown requested, stopping cycle");
                report.interrupted = true;
                break;
            }
            let outcome = run_query(&ctx, &mut self.tracker, index, query).await;
            report.outcomes.push(outcome);
        }

        self.stats.record_cycle(&report);
        report
    }
}

/// Borrowed collaborators shared by every query of a cycle
struct CycleContext<'a> {
    assembler: &'a RowAssembler,
    clock: &'a dyn Clock,
    kind: &'a str,
    source: &'a dyn RowSource,
    publisher: &'a dyn Publisher,
}

async fn run_query(
    ctx: &CycleContext<'_>,
    tracker: &mut DeltaTracker,
    index: usize,
    query: &QueryDescriptor,
) -> QueryOutcome {
    let mut outcome = QueryOutcome::new(index, query.mode);

    let opened = if query.mode.consumes_all_rows() {
        ctx.source.query(&query.text).await
    } else {
        ctx.source.query_first(&query.text).await
    };
    let mut cursor = match opened {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!(query = index, mode = %query.mode, error = %e, "query failed, skipping");
            outcome.fail(e);
            return outcome;
        }
    };
    outcome.state = QueryState::RowsOpen;

    let columns = cursor.columns().to_vec();
    let observed_at = ctx.clock.now();
    let mut event = Event::new(ctx.kind, observed_at);
    let mut row_ctx = RowContext {
        tracker,
        observed_at,
        query_index: index,
    };

    outcome.state = QueryState::Consuming;
    loop {
        let row = match cursor.next_row().await {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => {
                warn!(query = index, mode = %query.mode, error = %e, "cursor failed mid-stream, events dropped");
                outcome.fail(e);
                return outcome;
            }
        };
        outcome.rows += 1;

        if query.mode.emits_per_row() {
            row_ctx.observed_at = ctx.clock.now();
            let mut row_event = Event::new(ctx.kind, row_ctx.observed_at);
            ctx.assembler
                .assemble(query.mode, &columns, &row, &mut row_event, &mut row_ctx);
            emit(ctx.publisher, row_event, &mut outcome).await;
        } else {
            ctx.assembler
                .assemble(query.mode, &columns, &row, &mut event, &mut row_ctx);
        }

        if !query.mode.consumes_all_rows() {
            break;
        }
    }

    if !query.mode.emits_per_row() {
        emit(ctx.publisher, event, &mut outcome).await;
    }

    debug!(
        query = index,
        mode = %query.mode,
        rows = outcome.rows,
        events = outcome.events,
        "query complete"
    );
    outcome.state = QueryState::Closed;
    outcome
}

async fn emit(publisher: &dyn Publisher, event: Event, outcome: &mut QueryOutcome) {
    if !event.is_publishable() {
        debug!(query = outcome.index, "event has no data fields, not published");
        return;
    }
    match publisher.publish(event).await {
        Ok(()) => outcome.events += 1,
        Err(e) => {
            warn!(query = outcome.index, error = %e, "failed to publish event");
            outcome.publish_failures += 1;
            outcome.publish_error = Some(e);
        }
    }
}
