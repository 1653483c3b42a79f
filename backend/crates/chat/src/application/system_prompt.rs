//! System prompt cache
//!
//! The prompt is read from a file and reused until its time-to-live
//! expires, so edits take effect without a restart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct CachedPrompt {
    text: Arc<str>,
    loaded_at: Instant,
}

pub struct SystemPromptCache {
    path: Option<PathBuf>,
    fallback: Arc<str>,
    ttl: Duration,
    cached: RwLock<Option<CachedPrompt>>,
}

impl SystemPromptCache {
    pub fn new(path: Option<PathBuf>, fallback: impl Into<String>, ttl: Duration) -> Self {
        let fallback: String = fallback.into();
        Self {
            path,
            fallback: Arc::from(fallback),
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Always returns the fallback prompt
    pub fn fixed(prompt: impl Into<String>) -> Self {
        Self::new(None, prompt, Duration::MAX)
    }

    /// Current prompt, reloading it when the cached copy is older than the TTL.
    ///
    /// A failed reload keeps the previous text if there is one, otherwise
    /// falls back to the built-in prompt. Failures are retried after the TTL.
    pub async fn get(&self, now: Instant) -> Arc<str> {
        let Some(path) = &self.path else {
            return self.fallback.clone();
        };

        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if now.saturating_duration_since(entry.loaded_at) < self.ttl {
                    return entry.text.clone();
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(entry) = cached.as_ref() {
            if now.saturating_duration_since(entry.loaded_at) < self.ttl {
                return entry.text.clone();
            }
        }

        let text = match tokio::fs::read_to_string(path).await {
            Ok(raw) if !raw.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "System prompt loaded");
                Arc::from(raw.trim())
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "System prompt file is empty, using default");
                self.fallback.clone()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read system prompt");
                cached
                    .as_ref()
                    .map(|entry| entry.text.clone())
                    .unwrap_or_else(|| self.fallback.clone())
            }
        };

        *cached = Some(CachedPrompt {
            text: text.clone(),
            loaded_at: now,
        });
        text
    }
}
