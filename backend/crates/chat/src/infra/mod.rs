//! Infrastructure Layer
//!
//! Adapters for the domain ports: usage stores, the completion API,
//! notification delivery and the background schedulers.

pub mod json_file;
pub mod memory;
pub mod openai;
pub mod postgres;
pub mod scheduler;
pub mod webhook;

use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;
use crate::error::ChatResult;

use self::json_file::JsonFileUsageStore;
use self::postgres::PgUsageStore;

/// Usage store chosen at startup
pub enum UsageStoreBackend {
    File(JsonFileUsageStore),
    Postgres(PgUsageStore),
}

impl UsageStoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::File(_) => "json_file",
            Self::Postgres(_) => "postgres",
        }
    }
}

impl UsageStore for UsageStoreBackend {
    async fn load(&self) -> ChatResult<Option<UsageWindow>> {
        match self {
            Self::File(store) => store.load().await,
            Self::Postgres(store) => store.load().await,
        }
    }

    async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
        match self {
            Self::File(store) => store.save(window).await,
            Self::Postgres(store) => store.save(window).await,
        }
    }
}
