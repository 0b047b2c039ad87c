use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies pending schema versions, each inside its own transaction.
///
/// Version 1 creates `progress_records`, keyed by `(user_id, video_id)`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_records (
                    user_id TEXT NOT NULL CHECK (length(trim(user_id)) > 0),
                    video_id TEXT NOT NULL CHECK (length(trim(video_id)) > 0),
                    intervals TEXT NOT NULL,
                    video_duration REAL NOT NULL CHECK (video_duration > 0),
                    last_watched_position REAL NOT NULL CHECK (last_watched_position >= 0),
                    progress_percent REAL NOT NULL CHECK (progress_percent BETWEEN 0 AND 100),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, video_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
