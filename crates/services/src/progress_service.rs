use std::sync::Arc;

use tracing::{debug, warn};

use storage::repository::ProgressRepository;
use watch_core::engine::{self, MergePolicy, ProgressUpdate};
use watch_core::model::{ProgressKey, UserId};
use watch_core::time::Clock;

use crate::error::ProgressServiceError;
use crate::keyed_locks::KeyedLocks;
use crate::request::IngestRequest;
use crate::response::{IngestResponse, ProgressSnapshot, UserProgressItem};

/// Records watch progress: validates reports, merges them into the stored
/// record and answers progress queries.
///
/// Reports for the same `(user, video)` key are applied one at a time, so two
/// concurrent submissions never overwrite each other's intervals.
pub struct ProgressService {
    clock: Clock,
    policy: MergePolicy,
    repo: Arc<dyn ProgressRepository>,
    locks: KeyedLocks,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            policy: MergePolicy::strict(),
            repo,
            locks: KeyedLocks::default(),
        }
    }

    /// Override the interval merge policy (strict by default).
    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn merge_policy(&self) -> MergePolicy {
        self.policy
    }

    /// Validate a raw payload and ingest it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Validation` for malformed payloads, or any
    /// error from [`ProgressService::ingest`].
    pub async fn ingest_request(
        &self,
        request: IngestRequest,
    ) -> Result<IngestResponse, ProgressServiceError> {
        let update = request.validate()?;
        self.ingest(update).await
    }

    /// Merge a validated report into the stored record and persist the result.
    ///
    /// Nothing is written unless merging and progress computation succeed, and
    /// success is only reported after the write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Engine` if the duration is unusable and
    /// `ProgressServiceError::Storage` if the read or write fails.
    pub async fn ingest(
        &self,
        update: ProgressUpdate,
    ) -> Result<IngestResponse, ProgressServiceError> {
        let _guard = self.locks.lock(&update.key).await;

        let existing = self
            .repo
            .get_progress(&update.key)
            .await
            .inspect_err(|err| warn!(key = %update.key, error = %err, "progress lookup failed"))?;

        let record = engine::ingest(existing.as_ref(), &update, self.policy, self.clock.now())?;

        self.repo
            .put_progress(&record)
            .await
            .inspect_err(|err| warn!(key = %update.key, error = %err, "progress write failed"))?;

        debug!(
            key = %update.key,
            intervals = record.intervals().len(),
            progress = record.progress_percent(),
            created = existing.is_none(),
            "progress ingested"
        );

        Ok(IngestResponse::from_record(&record, update.current_time))
    }

    /// Progress for one key; a zeroed snapshot when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the lookup fails.
    pub async fn get_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<ProgressSnapshot, ProgressServiceError> {
        let record = self
            .repo
            .get_progress(key)
            .await
            .inspect_err(|err| warn!(key = %key, error = %err, "progress lookup failed"))?;
        Ok(record
            .as_ref()
            .map(ProgressSnapshot::from)
            .unwrap_or_default())
    }

    /// Every recorded video for a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the query fails.
    pub async fn list_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserProgressItem>, ProgressServiceError> {
        let records = self
            .repo
            .list_user_progress(user_id)
            .await
            .inspect_err(|err| warn!(user = %user_id, error = %err, "progress listing failed"))?;
        Ok(records.iter().map(UserProgressItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use watch_core::model::{Interval, VideoId};
    use watch_core::time::fixed_clock;

    use crate::request::RawInterval;

    fn service() -> ProgressService {
        ProgressService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn request(intervals: &[(f64, f64)], duration: f64) -> IngestRequest {
        IngestRequest {
            user_id: Some("u1".into()),
            video_id: Some("v1".into()),
            intervals: Some(
                intervals
                    .iter()
                    .map(|&(s, e)| RawInterval {
                        start: Some(s),
                        end: Some(e),
                    })
                    .collect(),
            ),
            video_duration: Some(duration),
            current_time: None,
        }
    }

    #[tokio::test]
    async fn ingest_then_extend() {
        let svc = service();
        let first = svc
            .ingest_request(request(&[(0.0, 50.0)], 100.0))
            .await
            .unwrap();
        assert_eq!(first.progress_percent, 50.0);
        assert_eq!(first.intervals, vec![Interval::new(0.0, 50.0).unwrap()]);

        let second = svc
            .ingest_request(request(&[(40.0, 120.0)], 100.0))
            .await
            .unwrap();
        assert_eq!(second.intervals, vec![Interval::new(0.0, 120.0).unwrap()]);
        assert_eq!(second.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let svc = service();
        let err = svc
            .ingest_request(request(&[], 100.0))
            .await
            .unwrap_err();
        assert!(err.is_client_error());

        let key = ProgressKey::new(UserId::new("u1").unwrap(), VideoId::new("v1").unwrap());
        assert_eq!(
            svc.get_progress(&key).await.unwrap(),
            ProgressSnapshot::default()
        );
    }

    #[tokio::test]
    async fn missing_record_yields_zero_snapshot() {
        let svc = service();
        let key = ProgressKey::new(UserId::new("nobody").unwrap(), VideoId::new("x").unwrap());
        let snapshot = svc.get_progress(&key).await.unwrap();
        assert_eq!(snapshot.progress_percent, 0.0);
        assert_eq!(snapshot.last_watched_position, 0.0);
        assert!(snapshot.intervals.is_empty());
    }
}
