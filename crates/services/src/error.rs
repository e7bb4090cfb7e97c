//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::ProgressError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
///
/// `NotEnrolled` is deliberately distinct from the not-found variants so a
/// caller can offer an enroll action instead of a dead end.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course not found")]
    CourseNotFound,

    #[error("lesson not found")]
    LessonNotFound,

    #[error("user is not enrolled in this course")]
    NotEnrolled,

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
    Storage(#[from] StorageError),
}
