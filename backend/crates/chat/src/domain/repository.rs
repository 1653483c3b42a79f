//! Port Traits
//!
//! Interfaces for persistence and external capabilities. Implementations
//! live in the infrastructure layer.

use crate::domain::entities::UsageWindow;
use crate::error::ChatResult;

/// Durable storage for the single reporting-window record
#[trait_variant::make(UsageStore: Send)]
pub trait LocalUsageStore {
    /// Load the record. `Ok(None)` when nothing has been persisted yet.
    async fn load(&self) -> ChatResult<Option<UsageWindow>>;

    /// Persist the record. Must be durable when this returns `Ok`.
    async fn save(&self, window: &UsageWindow) -> ChatResult<()>;
}

/// Completion model capability
#[trait_variant::make(CompletionClient: Send)]
pub trait LocalCompletionClient {
    /// Ask the model to answer `user_message` under `system_prompt`.
    /// Errors and missing content surface as `ChatError::Upstream`.
    async fn complete(&self, system_prompt: &str, user_message: &str) -> ChatResult<String>;
}

/// Outbound notification capability (best-effort)
#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    async fn notify(&self, text: &str) -> ChatResult<()>;
}

impl<T> UsageStore for std::sync::Arc<T>
where
    T: UsageStore + Send + Sync,
{
    async fn load(&self) -> ChatResult<Option<UsageWindow>> {
        (**self).load().await
    }

    async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
        (**self).save(window).await
    }
}
