use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ProgressKey, UserId, VideoId};
use crate::model::interval::Interval;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressRecordError {
    #[error("video duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("last watched position must be non-negative and finite, got {0}")]
    InvalidPosition(f64),

    #[error("progress percent must be within [0, 100], got {0}")]
    InvalidPercent(f64),

    #[error("intervals must be sorted and disjoint (violation at index {index})")]
    UnorderedIntervals { index: usize },
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Stored watch progress for one user on one video.
///
/// `intervals` is always sorted by start and pairwise disjoint. Only the
/// engine produces new records; storage rehydrates them via
/// [`ProgressRecord::from_persisted`], which re-checks the invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    key: ProgressKey,
    intervals: Vec<Interval>,
    video_duration: f64,
    last_watched_position: f64,
    progress_percent: f64,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressRecordError` if any stored field breaks a record invariant.
    pub fn from_persisted(
        key: ProgressKey,
        intervals: Vec<Interval>,
        video_duration: f64,
        last_watched_position: f64,
        progress_percent: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressRecordError> {
        if !video_duration.is_finite() || video_duration <= 0.0 {
            return Err(ProgressRecordError::InvalidDuration(video_duration));
        }
        if !last_watched_position.is_finite() || last_watched_position < 0.0 {
            return Err(ProgressRecordError::InvalidPosition(last_watched_position));
        }
        if !(0.0..=100.0).contains(&progress_percent) {
            return Err(ProgressRecordError::InvalidPercent(progress_percent));
        }
        if let Some(index) = intervals
            .windows(2)
            .position(|pair| pair[0].end() >= pair[1].start())
        {
            return Err(ProgressRecordError::UnorderedIntervals { index: index + 1 });
        }

        Ok(Self {
            key,
            intervals,
            video_duration,
            last_watched_position,
            progress_percent,
            updated_at,
        })
    }

    /// Engine-side constructor; callers guarantee the invariants.
    pub(crate) fn from_engine(
        key: ProgressKey,
        intervals: Vec<Interval>,
        video_duration: f64,
        last_watched_position: f64,
        progress_percent: f64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            intervals,
            video_duration,
            last_watched_position,
            progress_percent,
            updated_at,
        }
    }

    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.key.user_id
    }

    #[must_use]
    pub fn video_id(&self) -> &VideoId {
        &self.key.video_id
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    #[must_use]
    pub fn video_duration(&self) -> f64 {
        self.video_duration
    }

    #[must_use]
    pub fn last_watched_position(&self) -> f64 {
        self.last_watched_position
    }

    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
