//! Background tasks
//!
//! The daily reporter sleeps until the next cycle boundary and hands the
//! scheduled instant to [`UsageReporter::report`]. Reporting logic lives in
//! the application layer; this module only decides when to call it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::rate_limit::{LimiterChain, spawn_pruning};
use tokio::task::JoinHandle;

use crate::application::report_usage::UsageReporter;
use crate::domain::repository::{Notifier, UsageStore};
use crate::domain::value_objects::ReportSchedule;

/// How often elapsed rate limit entries are dropped
pub const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// The boundary to fire next, never one that already fired
fn next_fire(
    schedule: &ReportSchedule,
    now: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let next = schedule.next_boundary(now).with_timezone(&Utc);
    match last_fired {
        // Woke up early relative to the wall clock
        Some(last) if next <= last => last + chrono::Duration::days(1),
        _ => next,
    }
}

/// Run the usage report at every cycle boundary, forever
pub fn spawn_usage_reporter<S, N>(reporter: Arc<UsageReporter<S, N>>) -> JoinHandle<()>
where
    S: UsageStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let schedule = *reporter.schedule();
        let mut last_fired = None;

        loop {
            let now = Utc::now();
            let boundary = next_fire(&schedule, now, last_fired);
            let wait = (boundary - now).to_std().unwrap_or(Duration::ZERO);

            tracing::info!(next_report = %boundary, wait_secs = wait.as_secs(), "Usage report scheduled");
            tokio::time::sleep(wait).await;

            reporter.report(boundary).await;
            last_fired = Some(boundary);
        }
    })
}

/// How a background task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    Finished,
    Panicked,
    Cancelled,
}

/// Wait for a background task and log how it stopped.
///
/// The tasks above loop forever, so any exit is an error worth surfacing.
pub async fn watch_task(name: &'static str, handle: JoinHandle<()>) -> TaskExit {
    let exit = match handle.await {
        Ok(()) => TaskExit::Finished,
        Err(e) if e.is_panic() => TaskExit::Panicked,
        Err(_) => TaskExit::Cancelled,
    };
    tracing::error!(task = name, exit = ?exit, "Background task stopped");
    exit
}

/// Drop elapsed limiter entries once a minute
pub fn spawn_limiter_pruning(limiters: Arc<LimiterChain>) -> JoinHandle<()> {
    spawn_pruning(limiters, LIMITER_PRUNE_INTERVAL, || {
        Utc::now().timestamp_millis()
    })
}
