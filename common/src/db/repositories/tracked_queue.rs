// Tracked queue repository: one row per (account, queue) with its last payload

use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::TrackedQueue;
use sqlx::Row;
use tracing::instrument;

/// Repository for tracked queue snapshots
#[derive(Debug, Clone)]
pub struct TrackedQueueRepository {
    pool: DbPool,
}

impl TrackedQueueRepository {
    /// Create a new TrackedQueueRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// List every tracked queue in insertion order
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<TrackedQueue>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT account, queue, intervals
            FROM tracked_queues
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        let mut queues = Vec::with_capacity(rows.len());
        for row in rows {
            queues.push(TrackedQueue {
                account: row.try_get("account")?,
                queue: row.try_get("queue")?,
                intervals: row.try_get("intervals")?,
            });
        }

        tracing::debug!(count = queues.len(), "Loaded tracked queues");
        Ok(queues)
    }

    /// Raw payload for one tracked queue
    #[instrument(skip(self))]
    pub async fn find(&self, account: i64, queue: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT intervals
            FROM tracked_queues
            WHERE account = $1 AND queue = $2
            "#,
        )
        .bind(account)
        .bind(queue)
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("intervals")?)),
            None => Ok(None),
        }
    }

    /// Update the payload if the row exists, insert it otherwise
    #[instrument(skip(self, intervals), fields(payload_bytes = intervals.len()))]
    pub async fn upsert(
        &self,
        account: i64,
        queue: &str,
        intervals: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO tracked_queues (account, queue, intervals, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (account, queue)
            DO UPDATE SET intervals = EXCLUDED.intervals, updated_at = NOW()
            "#,
        )
        .bind(account)
        .bind(queue)
        .bind(intervals)
        .execute(self.pool.pool())
        .await?;

        tracing::debug!(account, queue, "Tracked queue payload saved");
        Ok(())
    }

    /// Blank the payload but keep the row tracked
    #[instrument(skip(self))]
    pub async fn clear(&self, account: i64, queue: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE tracked_queues
            SET intervals = '', updated_at = NOW()
            WHERE account = $1 AND queue = $2
            "#,
        )
        .bind(account)
        .bind(queue)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}
