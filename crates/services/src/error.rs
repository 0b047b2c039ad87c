//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use watch_core::EngineError;

use crate::request::ValidationError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressServiceError {
    /// True when the caller sent something unusable, as opposed to a backend failure.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Engine(err) => err.is_invalid_input(),
            Self::Storage(_) => false,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
