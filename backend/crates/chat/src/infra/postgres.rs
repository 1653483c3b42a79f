//! PostgreSQL usage store
//!
//! Single-row table `chat_usage_window`; see `database/migrations`.

use chrono::{DateTime, Offset, Utc};
use sqlx::PgPool;

use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;
use crate::error::{ChatError, ChatResult};

const RECORD_ID: i16 = 1;

/// PostgreSQL-backed usage store
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UsageStore for PgUsageStore {
    async fn load(&self) -> ChatResult<Option<UsageWindow>> {
        let row = sqlx::query_as::<_, UsageWindowRow>(
            r#"
            SELECT window_start_timestamp, prompts_in_window
            FROM chat_usage_window
            WHERE id = $1
            "#,
        )
        .bind(RECORD_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UsageWindowRow::into_usage_window).transpose()
    }

    async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
        let prompts = i64::try_from(window.prompts_in_window)
            .map_err(|_| ChatError::Store("prompt count exceeds BIGINT".into()))?;

        sqlx::query(
            r#"
            INSERT INTO chat_usage_window (id, window_start_timestamp, prompts_in_window, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE SET
                window_start_timestamp = EXCLUDED.window_start_timestamp,
                prompts_in_window = EXCLUDED.prompts_in_window,
                updated_at = NOW()
            "#,
        )
        .bind(RECORD_ID)
        .bind(window.window_start_timestamp.with_timezone(&Utc))
        .bind(prompts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UsageWindowRow {
    window_start_timestamp: DateTime<Utc>,
    prompts_in_window: i64,
}

impl UsageWindowRow {
    /// The column has no offset; the counter re-applies the configured one.
    fn into_usage_window(self) -> ChatResult<UsageWindow> {
        let prompts_in_window = u64::try_from(self.prompts_in_window)
            .map_err(|_| ChatError::Store("negative prompt count in database".into()))?;

        Ok(UsageWindow {
            window_start_timestamp: self.window_start_timestamp.with_timezone(&Utc.fix()),
            prompts_in_window,
        })
    }
}
