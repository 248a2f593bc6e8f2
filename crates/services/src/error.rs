//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::assessment::AssessmentConfigError;
use exam_core::model::{SessionError, SessionId};
use exam_core::{SettingsError, ValidationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while reading `EngineConfig` from the environment.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted by `AdaptiveAllocator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocatorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Assessment(#[from] AssessmentConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ExamLoopService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamLoopError {
    #[error("no questions could be allocated for this exam")]
    NoQuestions,
    #[error("session {0} has no result yet")]
    SessionNotFinished(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Allocator(#[from] AllocatorError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
