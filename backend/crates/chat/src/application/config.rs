//! Application Configuration
//!
//! Configuration for the chat application layer.

use std::time::Duration;

use platform::rate_limit::{LimitScope, LimiterChain, RateLimitConfig};

use crate::domain::value_objects::ReportSchedule;

/// Used when no system prompt file is configured or it cannot be read
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful website chatbot. Answer briefly and clearly.";

/// Chat application configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum trimmed message length in characters
    pub max_message_chars: usize,
    /// Per-caller fixed window
    pub caller_rate_limit: RateLimitConfig,
    /// Window shared by every caller
    pub global_rate_limit: RateLimitConfig,
    /// How long a loaded system prompt is reused
    pub system_prompt_ttl: Duration,
    /// Daily reporting boundary
    pub report_schedule: ReportSchedule,
    /// Key callers by the first X-Forwarded-For address
    pub trust_forwarded_for: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 60,
            caller_rate_limit: RateLimitConfig::from_millis(1, 5_000),
            global_rate_limit: RateLimitConfig::from_millis(30, 60_000),
            system_prompt_ttl: Duration::from_secs(300),
            report_schedule: ReportSchedule::default(),
            trust_forwarded_for: true,
        }
    }
}

impl ChatConfig {
    /// Per-caller limiter first, then the global one
    pub fn limiter_chain(&self) -> LimiterChain {
        LimiterChain::new()
            .with(LimitScope::PerCaller, self.caller_rate_limit)
            .with(LimitScope::Global, self.global_rate_limit)
    }
}
