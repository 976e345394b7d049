use chrono::{DateTime, Utc};

use crate::model::ids::{CompletedTaskId, CourseId, EnrollmentId, TaskId, UserId};
use crate::progress::Percentage;

/// Links a learner to a course and caches their completion percentage.
///
/// The cached percentage is only ever written by progress recalculation or
/// a reset; everything else treats it as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    id: EnrollmentId,
    learner_id: UserId,
    course_id: CourseId,
    enrolled_at: DateTime<Utc>,
    completion: Percentage,
}

impl Enrollment {
    /// A fresh enrollment with no progress.
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        learner_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self::from_persisted(id, learner_id, course_id, enrolled_at, Percentage::ZERO)
    }

    /// Rehydrate an enrollment from storage.
    #[must_use]
    pub fn from_persisted(
        id: EnrollmentId,
        learner_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
        completion: Percentage,
    ) -> Self {
        Self {
            id,
            learner_id,
            course_id,
            enrolled_at,
            completion,
        }
    }

    #[must_use]
    pub fn id(&self) -> EnrollmentId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> UserId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    #[must_use]
    pub fn completion(&self) -> Percentage {
        self.completion
    }

    #[must_use]
    pub fn is_owned_by(&self, learner_id: UserId) -> bool {
        self.learner_id == learner_id
    }

    /// Replace the cached percentage.
    pub fn set_completion(&mut self, completion: Percentage) {
        self.completion = completion;
    }
}

/// Fact record: `task_id` was completed under `enrollment_id`.
///
/// Unique per `(enrollment_id, task_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTask {
    pub id: CompletedTaskId,
    pub enrollment_id: EnrollmentId,
    pub task_id: TaskId,
    pub completed_at: DateTime<Utc>,
}
