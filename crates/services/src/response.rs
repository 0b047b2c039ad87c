use chrono::{DateTime, Utc};
use serde::Serialize;

use watch_core::model::{Interval, ProgressRecord};

/// Result of a successful ingest, echoing the stored state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub user_id: String,
    pub video_id: String,
    pub intervals: Vec<Interval>,
    pub video_duration: f64,
    pub last_watched_position: f64,
    pub progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
}

impl IngestResponse {
    #[must_use]
    pub fn from_record(record: &ProgressRecord, current_time: Option<f64>) -> Self {
        Self {
            user_id: record.user_id().to_string(),
            video_id: record.video_id().to_string(),
            intervals: record.intervals().to_vec(),
            video_duration: record.video_duration(),
            last_watched_position: record.last_watched_position(),
            progress_percent: record.progress_percent(),
            current_time,
        }
    }
}

/// Progress for one (user, video) pair; all zero when nothing was recorded yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress_percent: f64,
    pub last_watched_position: f64,
    pub intervals: Vec<Interval>,
}

impl From<&ProgressRecord> for ProgressSnapshot {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            progress_percent: record.progress_percent(),
            last_watched_position: record.last_watched_position(),
            intervals: record.intervals().to_vec(),
        }
    }
}

/// One entry of a user's progress listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressItem {
    pub video_id: String,
    pub progress_percent: f64,
    pub last_watched_position: f64,
    pub intervals: Vec<Interval>,
    pub video_duration: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProgressRecord> for UserProgressItem {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            video_id: record.video_id().to_string(),
            progress_percent: record.progress_percent(),
            last_watched_position: record.last_watched_position(),
            intervals: record.intervals().to_vec(),
            video_duration: record.video_duration(),
            updated_at: record.updated_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_serializes_zeroes() {
        let json = serde_json::to_value(ProgressSnapshot::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "progressPercent": 0.0,
                "lastWatchedPosition": 0.0,
                "intervals": []
            })
        );
    }
}
