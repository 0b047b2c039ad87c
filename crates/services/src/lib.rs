#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
mod keyed_locks;
pub mod progress_service;
pub mod request;
pub mod response;

pub use watch_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressServiceError};
pub use progress_service::ProgressService;
pub use request::{IngestRequest, RawInterval, ValidationError};
pub use response::{IngestResponse, ProgressSnapshot, UserProgressItem};
