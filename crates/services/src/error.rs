//! Shared error types for the services crate.

use thiserror::Error;

use course_core::Error as DomainError;
use course_core::model::{CourseError, CourseId, HierarchyError, TaskId, UserError, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("user {learner} is not enrolled in course {course}")]
    NotEnrolled { learner: UserId, course: CourseId },
    #[error("task {task} does not belong to course {course}")]
    TaskCourseMismatch { task: TaskId, course: CourseId },
    #[error("not found")]
    NotFound,
    #[error("enrollment belongs to another learner")]
    Forbidden,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ProgressError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `CourseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseServiceError {
    #[error("not allowed to modify this course")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("user {0} cannot teach a course")]
    InvalidTeacher(UserId),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for CourseServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl From<CourseError> for CourseServiceError {
    fn from(err: CourseError) -> Self {
        Self::Invalid(err.into())
    }
}

impl From<HierarchyError> for CourseServiceError {
    fn from(err: HierarchyError) -> Self {
        Self::Invalid(err.into())
    }
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error("not found")]
    NotFound,
    #[error("enrollment belongs to another learner")]
    Forbidden,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EnrollmentServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("only administrators may do this")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for UserServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl From<UserError> for UserServiceError {
    fn from(err: UserError) -> Self {
        Self::Invalid(err.into())
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    User(#[from] UserServiceError),
}
