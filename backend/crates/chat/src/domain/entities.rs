//! Domain Entities
//!
//! Core business entities for usage accounting.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The persisted reporting-window counter
///
/// Serialized as a human-readable record:
/// `{"windowStartTimestamp": "2024-03-10T18:00:00+01:00", "promptsInWindow": 3}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageWindow {
    pub window_start_timestamp: DateTime<FixedOffset>,
    pub prompts_in_window: u64,
}

impl UsageWindow {
    /// A zeroed window starting at `start`
    pub fn fresh(start: DateTime<FixedOffset>) -> Self {
        Self {
            window_start_timestamp: start,
            prompts_in_window: 0,
        }
    }

    /// Whether this record belongs to the window starting at `expected`.
    /// Compares instants, so the stored offset does not matter.
    pub fn starts_at(&self, expected: &DateTime<FixedOffset>) -> bool {
        self.window_start_timestamp == *expected
    }
}

/// Summary of a closed reporting window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub window_start: DateTime<FixedOffset>,
    pub window_end: DateTime<FixedOffset>,
    pub prompts: u64,
}

impl UsageReport {
    pub fn new(closed: &UsageWindow, window_end: DateTime<FixedOffset>) -> Self {
        Self {
            window_start: closed.window_start_timestamp,
            window_end,
            prompts: closed.prompts_in_window,
        }
    }

    /// Human-readable notification text
    pub fn to_message(&self) -> String {
        const LABEL: &str = "%Y-%m-%d %H:%M";
        format!(
            "Chat usage report\nWindow: {} to {} (UTC{})\nPrompts: {}",
            self.window_start.format(LABEL),
            self.window_end.with_timezone(self.window_start.offset()).format(LABEL),
            self.window_start.offset(),
            self.prompts,
        )
    }
}
