//! In-memory usage store
//!
//! Process-local; the record is lost on restart.

use std::sync::{Mutex, PoisonError};

use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;
use crate::error::ChatResult;

#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    record: Mutex<Option<UsageWindow>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record
    pub fn with_record(window: UsageWindow) -> Self {
        Self {
            record: Mutex::new(Some(window)),
        }
    }

    /// Current record without going through the port
    pub fn snapshot(&self) -> Option<UsageWindow> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UsageStore for InMemoryUsageStore {
    async fn load(&self) -> ChatResult<Option<UsageWindow>> {
        Ok(self.snapshot())
    }

    async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(window.clone());
        Ok(())
    }
}
