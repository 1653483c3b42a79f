//! Server configuration
//!
//! Everything is read from environment variables (optionally via `.env`).
//! Lookups go through a closure so parsing can be tested without touching
//! the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chat::infra::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig};
use chat::{ChatConfig, ReportSchedule};
use chrono::FixedOffset;
use platform::config::{ConfigError, env_opt, parse_or, require};
use platform::rate_limit::RateLimitConfig;

const DEFAULT_USAGE_STORE_PATH: &str = "data/usage.json";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// `None` allows any origin
    pub frontend_origins: Option<Vec<String>>,
    /// When set, usage is stored in Postgres
    pub database_url: Option<String>,
    pub usage_store_path: PathBuf,
    pub report_webhook_url: Option<String>,
    pub system_prompt_file: Option<PathBuf>,
    pub openai: OpenAiConfig,
    pub chat: ChatConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_opt)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key);
        let parse = |key: &str, default: u64| parse_or(key, get(key), default);

        let api_key = require("OPENAI_API_KEY", get("OPENAI_API_KEY"))?;

        let openai = OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(parse("OPENAI_TIMEOUT_SECS", 30)?),
        };

        let defaults = ChatConfig::default();

        let report_hour = parse_or(
            "REPORT_HOUR",
            get("REPORT_HOUR"),
            ReportSchedule::DEFAULT_HOUR,
        )?;
        let report_offset: FixedOffset =
            parse_or("REPORT_UTC_OFFSET", get("REPORT_UTC_OFFSET"), defaults.report_schedule.offset())?;
        let report_schedule =
            ReportSchedule::new(report_hour, report_offset).ok_or_else(|| ConfigError::Invalid {
                key: "REPORT_HOUR".to_string(),
                reason: format!("{report_hour} is not an hour of the day (0-23)"),
            })?;

        let chat = ChatConfig {
            max_message_chars: parse_or(
                "MAX_MESSAGE_CHARS",
                get("MAX_MESSAGE_CHARS"),
                defaults.max_message_chars,
            )?,
            caller_rate_limit: rate_limit(
                &get,
                "RATE_LIMIT_CALLER_MAX",
                "RATE_LIMIT_CALLER_WINDOW_MS",
                defaults.caller_rate_limit,
            )?,
            global_rate_limit: rate_limit(
                &get,
                "RATE_LIMIT_GLOBAL_MAX",
                "RATE_LIMIT_GLOBAL_WINDOW_MS",
                defaults.global_rate_limit,
            )?,
            system_prompt_ttl: Duration::from_secs(parse(
                "SYSTEM_PROMPT_TTL_SECS",
                defaults.system_prompt_ttl.as_secs(),
            )?),
            report_schedule,
            trust_forwarded_for: parse_or(
                "TRUST_FORWARDED_FOR",
                get("TRUST_FORWARDED_FOR"),
                defaults.trust_forwarded_for,
            )?,
        };

        if chat.max_message_chars == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_MESSAGE_CHARS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        let frontend_origins = get("FRONTEND_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        });

        Ok(Self {
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            frontend_origins,
            database_url: get("DATABASE_URL"),
            usage_store_path: get("USAGE_STORE_PATH")
                .unwrap_or_else(|| DEFAULT_USAGE_STORE_PATH.to_string())
                .into(),
            report_webhook_url: get("REPORT_WEBHOOK_URL"),
            system_prompt_file: get("SYSTEM_PROMPT_FILE").map(PathBuf::from),
            openai,
            chat,
        })
    }
}

/// Both values must be positive
fn rate_limit<F>(
    get: &F,
    max_key: &str,
    window_key: &str,
    default: RateLimitConfig,
) -> Result<RateLimitConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let max_requests: u32 = parse_or(max_key, get(max_key), default.max_requests)?;
    let window_ms: u64 = parse_or(
        window_key,
        get(window_key),
        default.window.as_millis() as u64,
    )?;

    if max_requests == 0 {
        return Err(ConfigError::Invalid {
            key: max_key.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    if window_ms == 0 {
        return Err(ConfigError::Invalid {
            key: window_key.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(RateLimitConfig::from_millis(max_requests, window_ms))
}
