//! Windowed usage counter
//!
//! Single owner of the persisted [`UsageWindow`]. Every read-modify-write
//! runs inside one async mutex, so increments from concurrent requests and
//! the scheduled rollover never interleave.
//!
//! Read failures count as "no prior state" and yield a fresh window.
//! Write failures are returned to the caller, who decides whether they
//! matter (for chat requests they do not).
//!
//! A request can cross a cycle boundary before the reporter wakes up. The
//! record it replaces is kept in memory until the next rollover reports it.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tokio::sync::Mutex;

use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;
use crate::domain::value_objects::ReportSchedule;
use crate::error::ChatResult;

/// Result of closing one window and opening the next
#[derive(Debug, Clone)]
pub struct Rollover {
    /// The window that ended, with its final count
    pub closed: UsageWindow,
    /// The window now in the store
    pub opened: UsageWindow,
    /// Whether the new window reached the store
    pub persisted: bool,
}

struct CounterState<S> {
    store: S,
    /// Previous-cycle record replaced before its rollover ran
    pending_closed: Option<UsageWindow>,
}

pub struct UsageCounter<S> {
    state: Mutex<CounterState<S>>,
    schedule: ReportSchedule,
}

impl<S> UsageCounter<S>
where
    S: UsageStore + Send + Sync,
{
    pub fn new(store: S, schedule: ReportSchedule) -> Self {
        Self {
            state: Mutex::new(CounterState {
                store,
                pending_closed: None,
            }),
            schedule,
        }
    }

    pub fn schedule(&self) -> &ReportSchedule {
        &self.schedule
    }

    /// Current window at `now`, created or corrected in the store if needed
    pub async fn read_or_init(&self, now: DateTime<Utc>) -> UsageWindow {
        let mut state = self.state.lock().await;
        let expected = self.schedule.window_start(now);
        let (window, changed) = self.current(&mut state, expected).await;
        if changed {
            if let Err(e) = state.store.save(&window).await {
                tracing::warn!(error = %e, "Failed to persist initialised usage window");
            }
        }
        window
    }

    /// Count one successful completion and return the new total
    pub async fn increment(&self, now: DateTime<Utc>) -> ChatResult<u64> {
        let mut state = self.state.lock().await;
        let expected = self.schedule.window_start(now);
        let (mut window, _) = self.current(&mut state, expected).await;

        window.prompts_in_window = window.prompts_in_window.saturating_add(1);
        state.store.save(&window).await?;

        tracing::debug!(
            prompts_in_window = window.prompts_in_window,
            "Usage counter incremented"
        );
        Ok(window.prompts_in_window)
    }

    /// Force the record to a zeroed window starting at `start`
    pub async fn reset_to(&self, start: DateTime<FixedOffset>) -> ChatResult<()> {
        let mut state = self.state.lock().await;
        state.pending_closed = None;
        state.store.save(&UsageWindow::fresh(start)).await
    }

    /// Close the window ending at `boundary` and open the one starting there.
    ///
    /// If a request already opened the new window, that record is kept and
    /// the closing window is the one it replaced. Reading and resetting
    /// happen under one lock.
    pub async fn roll_over(&self, boundary: DateTime<Utc>) -> Rollover {
        let mut state = self.state.lock().await;

        let closing_start = self.previous_start(self.schedule.window_start(boundary));
        let opening_start = self.schedule.window_start(boundary);
        let pending = state
            .pending_closed
            .take()
            .filter(|window| window.starts_at(&closing_start));

        let stored = Self::load(&state.store).await;

        if let Some(opened) = stored.clone().filter(|window| window.starts_at(&opening_start)) {
            let closed = pending.unwrap_or_else(|| UsageWindow::fresh(closing_start));
            return Rollover {
                closed,
                opened: UsageWindow {
                    window_start_timestamp: opening_start,
                    ..opened
                },
                persisted: true,
            };
        }

        let closed = match stored {
            Some(window) if window.starts_at(&closing_start) => UsageWindow {
                window_start_timestamp: closing_start,
                ..window
            },
            _ => pending.unwrap_or_else(|| UsageWindow::fresh(closing_start)),
        };

        let opened = UsageWindow::fresh(opening_start);
        let persisted = match state.store.save(&opened).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist usage window reset");
                false
            }
        };

        Rollover {
            closed,
            opened,
            persisted,
        }
    }

    /// Start of the cycle before the one starting at `start`
    fn previous_start(&self, start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.schedule
            .window_start(start.with_timezone(&Utc) - Duration::milliseconds(1))
    }

    async fn load(store: &S) -> Option<UsageWindow> {
        match store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Usage record unreadable, starting a fresh window");
                None
            }
        }
    }

    /// Stored record if it belongs to `expected`, otherwise a fresh one.
    /// The flag tells whether the result differs from what is stored.
    async fn current(
        &self,
        state: &mut CounterState<S>,
        expected: DateTime<FixedOffset>,
    ) -> (UsageWindow, bool) {
        match Self::load(&state.store).await {
            Some(window) if window.starts_at(&expected) => (
                UsageWindow {
                    window_start_timestamp: expected,
                    ..window
                },
                false,
            ),
            Some(stale) => {
                tracing::info!(
                    stale_start = %stale.window_start_timestamp,
                    stale_prompts = stale.prompts_in_window,
                    window_start = %expected,
                    "Usage window is stale, starting a new one"
                );
                let previous = self.previous_start(expected);
                if stale.starts_at(&previous) {
                    state.pending_closed = Some(UsageWindow {
                        window_start_timestamp: previous,
                        ..stale
                    });
                }
                (UsageWindow::fresh(expected), true)
            }
            None => (UsageWindow::fresh(expected), true),
        }
    }
}
