use serde::Deserialize;
use thiserror::Error;

use watch_core::ProgressUpdate;
use watch_core::model::{IdError, Interval, IntervalError, ProgressKey, UserId, VideoId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("intervals must not be empty")]
    EmptyIntervals,

    #[error("interval {index} is missing start or end")]
    IncompleteInterval { index: usize },

    #[error("interval {index} is invalid: {source}")]
    InvalidInterval {
        index: usize,
        #[source]
        source: IntervalError,
    },

    #[error("videoDuration must be a positive number, got {0}")]
    InvalidDuration(f64),

    #[error("currentTime must be a non-negative number, got {0}")]
    InvalidCurrentTime(f64),
}

/// One reported interval as it arrives on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RawInterval {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// Progress report payload before validation.
///
/// Every field is optional so that a missing field is reported as a
/// `ValidationError` naming it, not as an opaque decode failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub user_id: Option<String>,
    pub video_id: Option<String>,
    pub intervals: Option<Vec<RawInterval>>,
    pub video_duration: Option<f64>,
    pub current_time: Option<f64>,
}

impl IngestRequest {
    /// Check the payload shape and turn it into an engine update.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, checking ids, then
    /// intervals, then duration, then the optional playhead.
    pub fn validate(self) -> Result<ProgressUpdate, ValidationError> {
        let user_id = UserId::new(self.user_id.ok_or(ValidationError::MissingField("userId"))?)?;
        let video_id =
            VideoId::new(self.video_id.ok_or(ValidationError::MissingField("videoId"))?)?;

        let raw = self
            .intervals
            .ok_or(ValidationError::MissingField("intervals"))?;
        if raw.is_empty() {
            return Err(ValidationError::EmptyIntervals);
        }
        let intervals = raw
            .into_iter()
            .enumerate()
            .map(|(index, iv)| parse_interval(index, iv))
            .collect::<Result<Vec<_>, _>>()?;

        let video_duration = self
            .video_duration
            .ok_or(ValidationError::MissingField("videoDuration"))?;
        if !video_duration.is_finite() || video_duration <= 0.0 {
            return Err(ValidationError::InvalidDuration(video_duration));
        }

        let current_time = match self.current_time {
            Some(t) if !t.is_finite() || t < 0.0 => {
                return Err(ValidationError::InvalidCurrentTime(t));
            }
            other => other,
        };

        Ok(ProgressUpdate {
            key: ProgressKey::new(user_id, video_id),
            intervals,
            video_duration,
            current_time,
        })
    }
}

fn parse_interval(index: usize, raw: RawInterval) -> Result<Interval, ValidationError> {
    let (Some(start), Some(end)) = (raw.start, raw.end) else {
        return Err(ValidationError::IncompleteInterval { index });
    };
    Interval::new(start, end).map_err(|source| ValidationError::InvalidInterval { index, source })
}
