use sqlx::Row;
use watch_core::model::{Interval, ProgressKey, ProgressRecord, UserId, VideoId};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Intervals are stored as a JSON array of `{start, end}` objects.
pub(crate) fn intervals_to_json(intervals: &[Interval]) -> Result<String, StorageError> {
    serde_json::to_string(intervals).map_err(ser)
}

pub(crate) fn intervals_from_json(raw: &str) -> Result<Vec<Interval>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let video_id =
        VideoId::new(row.try_get::<String, _>("video_id").map_err(ser)?).map_err(ser)?;
    let intervals_raw: String = row.try_get("intervals").map_err(ser)?;
    let intervals = intervals_from_json(&intervals_raw)?;

    ProgressRecord::from_persisted(
        ProgressKey::new(user_id, video_id),
        intervals,
        row.try_get("video_duration").map_err(ser)?,
        row.try_get("last_watched_position").map_err(ser)?,
        row.try_get("progress_percent").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}
