//! Domain Value Objects
//!
//! Immutable value types for the chat domain.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};

use crate::domain::services::{most_recent_cycle_boundary, next_cycle_boundary};
use crate::error::{ChatError, ChatResult};

/// A validated user message
///
/// ## Invariants
/// - Surrounding whitespace is trimmed
/// - `1 <= chars <= max` after trimming, counted in Unicode scalar values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage(String);

impl ChatMessage {
    pub fn parse(raw: Option<&str>, max_chars: usize) -> ChatResult<Self> {
        let trimmed = raw.unwrap_or_default().trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let received = trimmed.chars().count();
        if received > max_chars {
            return Err(ChatError::MessageTooLong {
                max: max_chars,
                received,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Daily reporting boundary: a fixed local hour in a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSchedule {
    hour: u32,
    boundary: NaiveTime,
    offset: FixedOffset,
}

impl ReportSchedule {
    pub const DEFAULT_HOUR: u32 = 18;

    /// `None` if `hour` is not in `0..=23`
    pub fn new(hour: u32, offset: FixedOffset) -> Option<Self> {
        let boundary = NaiveTime::from_hms_opt(hour, 0, 0)?;
        Some(Self {
            hour,
            boundary,
            offset,
        })
    }

    /// Boundary at `hour:00` UTC
    pub fn utc(hour: u32) -> Option<Self> {
        Self::new(hour, Utc.fix())
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Start of the reporting window containing `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        most_recent_cycle_boundary(now, self.boundary, self.offset)
    }

    /// First boundary strictly after `now`
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        next_cycle_boundary(now, self.boundary, self.offset)
    }
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            hour: Self::DEFAULT_HOUR,
            boundary: NaiveTime::MIN + Duration::hours(i64::from(Self::DEFAULT_HOUR)),
            offset: Utc.fix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_trimmed() {
        let message = ChatMessage::parse(Some("  hello there \n"), 60).unwrap();
        assert_eq!(message.as_str(), "hello there");
    }

    #[test]
    fn test_absent_and_blank_messages_are_empty() {
        assert!(matches!(ChatMessage::parse(None, 60), Err(ChatError::EmptyMessage)));
        assert!(matches!(ChatMessage::parse(Some(""), 60), Err(ChatError::EmptyMessage)));
        assert!(matches!(
            ChatMessage::parse(Some(" \t\n "), 60),
            Err(ChatError::EmptyMessage)
        ));
    }

    #[test]
    fn test_length_boundary() {
        let exact = "a".repeat(60);
        assert!(ChatMessage::parse(Some(&exact), 60).is_ok());

        let over = "a".repeat(61);
        match ChatMessage::parse(Some(&over), 60) {
            Err(ChatError::MessageTooLong { max, received }) => {
                assert_eq!(max, 60);
                assert_eq!(received, 61);
            }
            other => panic!("expected MessageTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let accented = "é".repeat(60);
        assert_eq!(accented.len(), 120);
        assert!(ChatMessage::parse(Some(&accented), 60).is_ok());
    }

    #[test]
    fn test_surrounding_whitespace_does_not_count() {
        let padded = format!("   {}   ", "a".repeat(60));
        assert!(ChatMessage::parse(Some(&padded), 60).is_ok());
    }

    #[test]
    fn test_schedule_rejects_invalid_hour() {
        assert!(ReportSchedule::utc(24).is_none());
        assert!(ReportSchedule::utc(23).is_some());
    }

    #[test]
    fn test_default_schedule_is_six_pm_utc() {
        let schedule = ReportSchedule::default();
        assert_eq!(schedule, ReportSchedule::utc(18).unwrap());
        assert_eq!(schedule.offset().local_minus_utc(), 0);
    }
}
