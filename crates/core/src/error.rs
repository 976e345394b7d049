use thiserror::Error;

use crate::model::{CourseError, HierarchyError, UserError};
use crate::progress::PercentageError;

/// Any domain validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Percentage(#[from] PercentageError),
}
