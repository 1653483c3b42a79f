//! Rate Limiting Infrastructure
//!
//! Fixed-window admission control kept in process memory.
//!
//! Each [`FixedWindowLimiter`] partitions its state by scope key. A
//! [`LimiterChain`] composes several limiters (per caller, global) and admits
//! a request only when every limiter admits it. Evaluation stops at the first
//! rejection; limiters checked before it keep the attempt they recorded.
//!
//! State is lost on restart. This is abuse mitigation, not billing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn from_millis(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The attempt was counted. `remaining` attempts are left in this window.
    Admitted { remaining: u32 },
    /// The window is full. Nothing was counted.
    Rejected { retry_after_ms: i64 },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admitted { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start_ms: i64,
}

/// Fixed-window counter keyed by scope key
#[derive(Debug)]
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check the window for `key` at `now_ms` and count the attempt if admitted.
    ///
    /// An absent entry, or one whose window has elapsed, restarts at
    /// `{count: 0, window_start_ms: now_ms}` before the check.
    pub fn check_and_record(&self, key: &str, now_ms: i64) -> RateLimitDecision {
        let window_ms = self.config.window_ms();
        let mut entries = self.lock();

        let entry = entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start_ms: now_ms,
        });

        if now_ms >= entry.window_start_ms.saturating_add(window_ms) {
            *entry = WindowEntry {
                count: 0,
                window_start_ms: now_ms,
            };
        }

        if entry.count < self.config.max_requests {
            entry.count += 1;
            RateLimitDecision::Admitted {
                remaining: self.config.max_requests - entry.count,
            }
        } else {
            let retry_after_ms = entry
                .window_start_ms
                .saturating_add(window_ms)
                .saturating_sub(now_ms)
                .clamp(0, window_ms);
            RateLimitDecision::Rejected { retry_after_ms }
        }
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn prune(&self, now_ms: i64) -> usize {
        let window_ms = self.config.window_ms();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now_ms < entry.window_start_ms.saturating_add(window_ms));
        before - entries.len()
    }

    /// Number of tracked scope keys
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    // Counts stay meaningful after a panicking holder, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a limiter partitions callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// One window per caller identity
    PerCaller,
    /// One window shared by every caller
    Global,
}

impl LimitScope {
    const GLOBAL_KEY: &'static str = "global";

    /// Scope key for a caller under this scope
    pub fn key<'a>(&self, caller: &'a str) -> &'a str {
        match self {
            LimitScope::PerCaller => caller,
            LimitScope::Global => Self::GLOBAL_KEY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::PerCaller => "caller",
            LimitScope::Global => "global",
        }
    }
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection from a [`LimiterChain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub scope: LimitScope,
    pub retry_after_ms: i64,
}

/// Ordered composition of scoped limiters
#[derive(Debug, Default)]
pub struct LimiterChain {
    limiters: Vec<(LimitScope, FixedWindowLimiter)>,
}

impl LimiterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a limiter. Limiters are evaluated in insertion order.
    pub fn with(mut self, scope: LimitScope, config: RateLimitConfig) -> Self {
        self.limiters.push((scope, FixedWindowLimiter::new(config)));
        self
    }

    /// Admit `caller` at `now_ms` only if every limiter admits it.
    ///
    /// Charge-as-you-check: limiters before the rejecting one have already
    /// counted this attempt and are not rolled back.
    pub fn check(&self, caller: &str, now_ms: i64) -> Result<(), RateLimitRejection> {
        for (scope, limiter) in &self.limiters {
            if let RateLimitDecision::Rejected { retry_after_ms } =
                limiter.check_and_record(scope.key(caller), now_ms)
            {
                tracing::warn!(
                    scope = %scope,
                    caller = %caller,
                    retry_after_ms = retry_after_ms,
                    "Rate limit exceeded"
                );
                return Err(RateLimitRejection {
                    scope: *scope,
                    retry_after_ms,
                });
            }
        }
        Ok(())
    }

    /// Configured policies in evaluation order
    pub fn policies(&self) -> impl Iterator<Item = (LimitScope, RateLimitConfig)> + '_ {
        self.limiters
            .iter()
            .map(|(scope, limiter)| (*scope, *limiter.config()))
    }

    /// Drop elapsed entries from every limiter
    pub fn prune(&self, now_ms: i64) -> usize {
        self.limiters
            .iter()
            .map(|(_, limiter)| limiter.prune(now_ms))
            .sum()
    }
}

/// Periodically prune elapsed limiter entries in the background
pub fn spawn_pruning(
    chain: Arc<LimiterChain>,
    every: Duration,
    now_ms: fn() -> i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = chain.prune(now_ms());
            if removed > 0 {
                tracing::debug!(removed = removed, "Pruned rate limit entries");
            }
        }
    })
}
