//! Interval consolidation and progress computation.
//!
//! Everything here is pure: no I/O, no shared state. Callers own the
//! read-modify-write cycle around [`ingest`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Interval, ProgressKey, ProgressRecord};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("video duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("merge gap must be non-negative and finite, got {0}")]
    InvalidGap(f64),
}

impl EngineError {
    /// Every engine error is a contract violation by the caller.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidDuration(_) | Self::InvalidGap(_))
    }
}

//
// ─── MERGE POLICY ──────────────────────────────────────────────────────────────
//

/// Decides when two sorted intervals are close enough to merge.
///
/// The default is strict: intervals merge when `next.start <= current.end`,
/// so touching boundaries merge and nothing else does. A positive `max_gap`
/// tolerates reporting holes up to that many seconds; the hole is then counted
/// as watched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MergePolicy {
    max_gap: f64,
}

impl MergePolicy {
    #[must_use]
    pub const fn strict() -> Self {
        Self { max_gap: 0.0 }
    }

    /// Policy that also merges intervals separated by at most `max_gap` seconds.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidGap` if `max_gap` is negative or non-finite.
    pub fn with_gap(max_gap: f64) -> Result<Self, EngineError> {
        if !max_gap.is_finite() || max_gap < 0.0 {
            return Err(EngineError::InvalidGap(max_gap));
        }
        Ok(Self { max_gap })
    }

    #[must_use]
    pub fn max_gap(&self) -> f64 {
        self.max_gap
    }

    fn joins(&self, current: &Interval, next: &Interval) -> bool {
        next.start() <= current.end() + self.max_gap
    }
}

//
// ─── MERGE ─────────────────────────────────────────────────────────────────────
//

/// Merge intervals under the strict (gap-free) policy.
///
/// ```
/// # use watch_core::engine::merge_intervals;
/// # use watch_core::model::Interval;
/// let iv = |s, e| Interval::new(s, e).unwrap();
/// let merged = merge_intervals(&[iv(0.0, 10.0), iv(5.0, 15.0), iv(20.0, 25.0)]);
/// assert_eq!(merged, vec![iv(0.0, 15.0), iv(20.0, 25.0)]);
/// ```
#[must_use]
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    merge_intervals_with(intervals, MergePolicy::strict())
}

/// Sort by `(start, end)` and fold overlapping or touching intervals together.
///
/// Output is start-ascending and pairwise disjoint. Empty input yields an
/// empty output; zero-length intervals are kept.
#[must_use]
pub fn merge_intervals_with(intervals: &[Interval], policy: MergePolicy) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| {
        a.start()
            .total_cmp(&b.start())
            .then(a.end().total_cmp(&b.end()))
    });

    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for next in iter {
        if policy.joins(&current, &next) {
            current = current.extended_to(next.end());
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Total seconds covered by an already merged interval set.
#[must_use]
pub fn watched_seconds(merged: &[Interval]) -> f64 {
    merged.iter().map(Interval::len).sum()
}

/// Percentage of `video_duration` covered by `merged`, clamped to `[0, 100]`.
///
/// `merged` must be the output of a merge; overlapping input would be counted
/// twice.
///
/// # Errors
///
/// Returns `EngineError::InvalidDuration` if `video_duration` is not a positive,
/// finite number.
pub fn compute_progress(merged: &[Interval], video_duration: f64) -> Result<f64, EngineError> {
    if !video_duration.is_finite() || video_duration <= 0.0 {
        return Err(EngineError::InvalidDuration(video_duration));
    }
    let percent = watched_seconds(merged) / video_duration * 100.0;
    Ok(percent.clamp(0.0, 100.0))
}

/// Resume position: the reported playhead if usable, else the end of the last
/// watched interval, else zero.
#[must_use]
pub fn last_watched_position(merged: &[Interval], current_time: Option<f64>) -> f64 {
    match current_time {
        Some(t) if t.is_finite() && t >= 0.0 => t,
        _ => merged.last().map_or(0.0, Interval::end),
    }
}

//
// ─── INGEST ────────────────────────────────────────────────────────────────────
//

/// A validated progress report for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub key: ProgressKey,
    pub intervals: Vec<Interval>,
    pub video_duration: f64,
    pub current_time: Option<f64>,
}

/// Fold a progress report into the existing record (if any).
///
/// Produces the full replacement record. Re-submitting the same intervals is
/// a no-op for coverage, and coverage never shrinks.
///
/// # Errors
///
/// Returns `EngineError::InvalidDuration` if the reported duration is not positive.
pub fn ingest(
    existing: Option<&ProgressRecord>,
    update: &ProgressUpdate,
    policy: MergePolicy,
    now: DateTime<Utc>,
) -> Result<ProgressRecord, EngineError> {
    let mut combined: Vec<Interval> = existing
        .map(|record| record.intervals().to_vec())
        .unwrap_or_default();
    combined.extend_from_slice(&update.intervals);

    let merged = merge_intervals_with(&combined, policy);
    let progress_percent = compute_progress(&merged, update.video_duration)?;
    let position = last_watched_position(&merged, update.current_time);

    Ok(ProgressRecord::from_engine(
        update.key.clone(),
        merged,
        update.video_duration,
        position,
        progress_percent,
        now,
    ))
}
