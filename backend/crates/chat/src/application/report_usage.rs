//! Report Usage Use Case
//!
//! Runs once per reporting cycle: closes the window that just ended,
//! opens a zeroed one and sends the summary. Invoked directly with the
//! boundary instant, so it is testable without the scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::usage_counter::UsageCounter;
use crate::domain::entities::UsageReport;
use crate::domain::repository::{Notifier, UsageStore};
use crate::domain::value_objects::ReportSchedule;

/// What happened during one report run
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report: UsageReport,
    /// Whether the notifier accepted the summary
    pub delivered: bool,
    /// Whether the reset window reached the store
    pub reset_persisted: bool,
}

pub struct UsageReporter<S, N> {
    counter: Arc<UsageCounter<S>>,
    notifier: Arc<N>,
}

impl<S, N> UsageReporter<S, N>
where
    S: UsageStore + Send + Sync,
    N: Notifier + Send + Sync,
{
    pub fn new(counter: Arc<UsageCounter<S>>, notifier: Arc<N>) -> Self {
        Self { counter, notifier }
    }

    pub fn schedule(&self) -> &ReportSchedule {
        self.counter.schedule()
    }

    /// Report the window ending at `boundary` and start the next one.
    ///
    /// The reset is committed before delivery is attempted, so a failed
    /// notification never leaves the old count in place.
    pub async fn report(&self, boundary: DateTime<Utc>) -> ReportOutcome {
        let rollover = self.counter.roll_over(boundary).await;
        let report = UsageReport::new(&rollover.closed, rollover.opened.window_start_timestamp);

        let delivered = match self.notifier.notify(&report.to_message()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to deliver usage report");
                false
            }
        };

        tracing::info!(
            window_start = %report.window_start,
            window_end = %report.window_end,
            prompts = report.prompts,
            delivered,
            reset_persisted = rollover.persisted,
            "Usage report completed"
        );

        ReportOutcome {
            report,
            delivered,
            reset_persisted: rollover.persisted,
        }
    }
}
