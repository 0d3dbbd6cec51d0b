//! Poll loop
//!
//! `Beat` drives a `Dispatcher` on a fixed period until shutdown. The first
//! cycle runs right away; a cycle that overruns the period delays the next
//! tick instead of bunching up missed ones.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BeatConfig;
use crate::dispatcher::{CycleReport, Dispatcher, DispatcherStats};
use crate::error::{Error, Result};
use crate::publisher::Publisher;
use crate::source::RowSource;

/// Periodic query runner
pub struct Beat {
    dispatcher: Dispatcher,
    period: Duration,
}

impl Beat {
    /// Create a runner
    pub fn new(dispatcher: Dispatcher, period: Duration) -> Self {
        Self { dispatcher, period }
    }

    /// Create a runner from configuration
    pub fn from_config(config: &BeatConfig) -> Result<Self> {
        if config.period.is_zero() {
            return Err(Error::config("period must be greater than zero"));
        }
        Ok(Self::new(config.dispatcher()?, config.period))
    }

    /// Interval between cycles
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Log the configured queries
    pub fn log_plan(&self) {
        let queries = self.dispatcher.queries();
        info!(
            count = queries.len(),
            period = ?self.period,
            "query plan"
        );
        for (index, query) in queries.iter().enumerate() {
            info!(query = index, mode = %query.mode, sql = %query.text, "configured query");
        }
    }

    /// Run a single cycle
    pub async fn run_once(
        &mut self,
        source: &dyn RowSource,
        publisher: &dyn Publisher,
        shutdown: &CancellationToken,
    ) -> CycleReport {
        let report = self.dispatcher.run_cycle(source, publisher, shutdown).await;
        log_report(&report);
        report
    }

    /// Poll until `shutdown` is cancelled
    pub async fn run(
        &mut self,
        source: &dyn RowSource,
        publisher: &dyn Publisher,
        shutdown: &CancellationToken,
    ) -> DispatcherStats {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?self.period, "sqlbeat is running");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {}
            }

            let report = self.run_once(source, publisher, shutdown).await;
            if report.interrupted {
                break;
            }
        }

        let stats = self.dispatcher.stats();
        info!(
            cycles = stats.cycles,
            events = stats.events_published,
            query_failures = stats.query_failures,
            publish_failures = stats.publish_failures,
            "sqlbeat stopped"
        );
        stats
    }
}

fn log_report(report: &CycleReport) {
    for outcome in report.outcomes.iter() {
        if let Some(e) = &outcome.publish_error {
            warn!(
                query = outcome.index,
                failures = outcome.publish_failures,
                error = %e,
                "events could not be published"
            );
        }
    }

    if report.is_clean() {
        debug!(events = report.events_published(), "cycle complete");
    } else {
        info!(
            events = report.events_published(),
            failed_queries = report.failed_queries(),
            publish_failures = report.publish_failures(),
            interrupted = report.interrupted,
            "cycle complete with errors"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::RowAssembler;
    use crate::dispatcher::{QueryDescriptor, QueryMode};
    use crate::publisher::MemoryPublisher;
    use crate::source::MemoryRowSource;

    fn beat(period: Duration) -> Beat {
        let dispatcher = Dispatcher::new(
            vec![QueryDescriptor::new("SELECT 1 AS one", QueryMode::SingleRow)],
            RowAssembler::default(),
        );
        Beat::new(dispatcher, period)
    }

    fn source() -> MemoryRowSource {
        MemoryRowSource::new().with_result("SELECT 1 AS one", ["one"], [["1"]])
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = BeatConfig {
            period: Duration::ZERO,
            queries: vec!["SELECT 1".into()],
            query_types: vec!["single-row".into()],
            ..Default::default()
        };
        assert!(Beat::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled_before_start() {
        let mut beat = beat(Duration::from_secs(10));
        let publisher = MemoryPublisher::new();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = beat.run(&source(), &publisher, &shutdown).await;
        assert_eq!(stats.cycles, 0);
        assert!(publisher.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_each_tick() {
        let mut beat = beat(Duration::from_secs(10));
        let source = source();
        let publisher = MemoryPublisher::new();
        let shutdown = CancellationToken::new();

        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            stopper.cancel();
        });

        let stats = beat.run(&source, &publisher, &shutdown).await;

        // ticks at 0s, 10s and 20s
        assert_eq!(stats.cycles, 3);
        assert_eq!(publisher.len(), 3);
    }
}
