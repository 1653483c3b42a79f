//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, FixedOffset};
use platform::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};

use crate::application::check_health::HealthStatus;

/// Request for POST /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Response for POST /api/chat
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Response for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub limits: LimitsDto,
    pub usage: UsageDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsDto {
    pub max_message_chars: usize,
    pub per_caller: RateLimitPolicyDto,
    pub global: RateLimitPolicyDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicyDto {
    pub max_requests: u32,
    pub window_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDto {
    pub window_start_timestamp: DateTime<FixedOffset>,
    pub prompts_in_window: u64,
}

impl From<RateLimitConfig> for RateLimitPolicyDto {
    fn from(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window_ms: config.window_ms(),
        }
    }
}

impl From<HealthStatus> for HealthResponse {
    fn from(status: HealthStatus) -> Self {
        Self {
            ok: true,
            limits: LimitsDto {
                max_message_chars: status.max_message_chars,
                per_caller: status.per_caller.into(),
                global: status.global.into(),
            },
            usage: UsageDto {
                window_start_timestamp: status.usage.window_start_timestamp,
                prompts_in_window: status.usage.prompts_in_window,
            },
        }
    }
}
