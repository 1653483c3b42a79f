//! Check Health Use Case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::rate_limit::RateLimitConfig;

use crate::application::config::ChatConfig;
use crate::application::usage_counter::UsageCounter;
use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;

/// Configured limits plus the live reporting window
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub max_message_chars: usize,
    pub per_caller: RateLimitConfig,
    pub global: RateLimitConfig,
    pub usage: UsageWindow,
}

pub struct CheckHealthUseCase<S> {
    counter: Arc<UsageCounter<S>>,
    config: Arc<ChatConfig>,
}

impl<S> CheckHealthUseCase<S>
where
    S: UsageStore + Send + Sync,
{
    pub fn new(counter: Arc<UsageCounter<S>>, config: Arc<ChatConfig>) -> Self {
        Self { counter, config }
    }

    pub async fn execute(&self, now: DateTime<Utc>) -> HealthStatus {
        HealthStatus {
            max_message_chars: self.config.max_message_chars,
            per_caller: self.config.caller_rate_limit,
            global: self.config.global_rate_limit,
            usage: self.counter.read_or_init(now).await,
        }
    }
}
