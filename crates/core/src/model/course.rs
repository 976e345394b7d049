use chrono::NaiveDate;
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course name cannot be empty")]
    EmptyName,

    #[error("course name is too long ({len} > {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("course ends ({ends_on}) before it starts ({starts_on})")]
    InvalidDateRange {
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    },
}

pub const MAX_NAME_LEN: usize = 100;

//
// ─── DETAILS ───────────────────────────────────────────────────────────────────
//

/// Validated course fields that do not depend on storage: everything except
/// the id and the teacher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDetails {
    name: String,
    description: String,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    active: bool,
}

impl CourseDetails {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyName` / `NameTooLong` for a bad name and
    /// `CourseError::InvalidDateRange` if `ends_on` precedes `starts_on`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
        active: bool,
    ) -> Result<Self, CourseError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(CourseError::EmptyName);
        }
        let len = name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(CourseError::NameTooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }
        if ends_on < starts_on {
            return Err(CourseError::InvalidDateRange { starts_on, ends_on });
        }

        Ok(Self {
            name,
            description: description.into(),
            starts_on,
            ends_on,
            active,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn starts_on(&self) -> NaiveDate {
        self.starts_on
    }

    #[must_use]
    pub fn ends_on(&self) -> NaiveDate {
        self.ends_on
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course taught by a teacher. Units hang off it via `Unit::course_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    teacher_id: UserId,
    details: CourseDetails,
}

impl Course {
    /// Creates a validated course.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`CourseDetails::new`].
    pub fn new(
        id: CourseId,
        name: impl Into<String>,
        description: impl Into<String>,
        teacher_id: UserId,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
        active: bool,
    ) -> Result<Self, CourseError> {
        let details = CourseDetails::new(name, description, starts_on, ends_on, active)?;
        Ok(Self::from_details(id, teacher_id, details))
    }

    #[must_use]
    pub fn from_details(id: CourseId, teacher_id: UserId, details: CourseDetails) -> Self {
        Self {
            id,
            teacher_id,
            details,
        }
    }

    #[must_use]
    pub fn details(&self) -> &CourseDetails {
        &self.details
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.details.name()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        self.details.description()
    }

    #[must_use]
    pub fn teacher_id(&self) -> UserId {
        self.teacher_id
    }

    #[must_use]
    pub fn starts_on(&self) -> NaiveDate {
        self.details.starts_on()
    }

    #[must_use]
    pub fn ends_on(&self) -> NaiveDate {
        self.details.ends_on()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.details.is_active()
    }
}
