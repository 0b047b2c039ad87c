use async_trait::async_trait;
use watch_core::model::{ProgressKey, ProgressRecord, UserId};

use super::SqliteRepository;
use super::mapping::{intervals_to_json, map_progress_row};
use crate::repository::{ProgressRepository, StorageError, listing_order};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, video_id, intervals, video_duration,
                    last_watched_position, progress_percent, updated_at
                FROM progress_records
                WHERE user_id = ?1 AND video_id = ?2
            ",
        )
        .bind(key.user_id.as_str())
        .bind(key.video_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn put_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let intervals = intervals_to_json(record.intervals())?;

        sqlx::query(
            r"
                INSERT INTO progress_records (
                    user_id, video_id, intervals, video_duration,
                    last_watched_position, progress_percent, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id, video_id) DO UPDATE SET
                    intervals = excluded.intervals,
                    video_duration = excluded.video_duration,
                    last_watched_position = excluded.last_watched_position,
                    progress_percent = excluded.progress_percent,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id().as_str())
        .bind(record.video_id().as_str())
        .bind(intervals)
        .bind(record.video_duration())
        .bind(record.last_watched_position())
        .bind(record.progress_percent())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, video_id, intervals, video_duration,
                    last_watched_position, progress_percent, updated_at
                FROM progress_records
                WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        // Text timestamps do not sort reliably across precisions; order in Rust.
        out.sort_by(listing_order);
        Ok(out)
    }
}
