use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use watch_core::model::{ProgressKey, ProgressRecord, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for per-(user, video) progress records.
///
/// Implementations replace the whole record on `put_progress`; callers are
/// expected to serialize read-modify-write cycles for the same key.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the record for a key, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails or the stored row is corrupt.
    async fn get_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or replace the record for its key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn put_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// All records for a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or any row is corrupt.
    async fn list_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Listing order shared by every backend: newest `updated_at` first, then `video_id`.
pub(crate) fn listing_order(a: &ProgressRecord, b: &ProgressRecord) -> Ordering {
    b.updated_at()
        .cmp(&a.updated_at())
        .then_with(|| a.video_id().cmp(b.video_id()))
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<ProgressKey, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.key().clone(), record.clone());
        Ok(())
    }

    async fn list_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<ProgressRecord> = guard
            .values()
            .filter(|record| record.user_id() == user_id)
            .cloned()
            .collect();
        found.sort_by(listing_order);
        Ok(found)
    }
}

/// Which backend a `Storage` was built with; reported by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    InMemory,
    Sqlite,
}

impl StorageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::InMemory => "memory",
            StorageKind::Sqlite => "sqlite",
        }
    }
}

/// Progress repository behind a trait object so the backend is chosen once at startup.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub kind: StorageKind,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self {
            progress,
            kind: StorageKind::InMemory,
        }
    }
}
