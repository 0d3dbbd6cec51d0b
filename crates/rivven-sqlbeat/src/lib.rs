//! # rivven-sqlbeat
//!
//! Periodically runs a fixed list of SQL queries and turns their result rows
//! into typed telemetry events.
//!
//! ## Query modes
//!
//! | Mode | Rows read | Events |
//! |------|-----------|--------|
//! | `single-row` | first | one, every column a field |
//! | `two-columns` | all | one, each row a `(name, value)` pair |
//! | `multiple-rows` | all | one per row |
//! | `show-slave-delay` | first | one, a single integer column |
//!
//! Cells are classified as integer, float or string. Columns whose name ends
//! with the delta marker (`__DELTA` by default) are reported as a per-second
//! rate against the previous cycle instead of their raw value.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rivven_sqlbeat::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> rivven_sqlbeat::Result<()> {
//! let source = MemoryRowSource::new().with_result(
//!     "SHOW GLOBAL STATUS",
//!     ["Variable_name", "Value"],
//!     [["Questions__DELTA", "100"], ["Threads_connected", "4"]],
//! );
//! let publisher = StdoutPublisher::default();
//!
//! let mut dispatcher = Dispatcher::new(
//!     vec![QueryDescriptor::new("SHOW GLOBAL STATUS", QueryMode::TwoColumns)],
//!     RowAssembler::default(),
//! );
//! let report = dispatcher
//!     .run_cycle(&source, &publisher, &CancellationToken::new())
//!     .await;
//! assert_eq!(report.failed_queries(), 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod assembler;
pub mod beat;
pub mod clock;
pub mod config;
pub mod delta;
pub mod dispatcher;
pub mod error;
pub mod infer;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod publisher;
pub mod source;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{ColumnValue, Event};

/// Prelude for common imports
pub mod prelude {
    pub use crate::assembler::RowAssembler;
    pub use crate::beat::Beat;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{BeatConfig, Config};
    pub use crate::delta::DeltaTracker;
    pub use crate::dispatcher::{
        CycleReport, Dispatcher, DispatcherStats, QueryDescriptor, QueryMode,
    };
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::infer::infer;
    #[cfg(feature = "mysql")]
    pub use crate::mysql::MySqlRowSource;
    pub use crate::publisher::{MemoryPublisher, OutputFormat, Publisher, StdoutPublisher};
    pub use crate::source::{MemoryRowSource, RowCursor, RowSource};
    pub use crate::types::{ColumnValue, Event};
}
