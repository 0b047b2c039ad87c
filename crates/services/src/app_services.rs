use std::sync::Arc;

use storage::repository::{Storage, StorageKind};
use watch_core::engine::MergePolicy;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over a storage backend chosen at startup.
#[derive(Clone)]
pub struct AppServices {
    storage_kind: StorageKind,
    progress: Arc<ProgressService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock, policy: MergePolicy) -> Self {
        let progress = Arc::new(
            ProgressService::new(clock, Arc::clone(&storage.progress)).with_merge_policy(policy),
        );
        Self {
            storage_kind: storage.kind,
            progress,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        policy: MergePolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, clock, policy))
    }

    /// Build services over a process-local in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock, policy: MergePolicy) -> Self {
        Self::new(Storage::in_memory(), clock, policy)
    }

    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        self.storage_kind
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
