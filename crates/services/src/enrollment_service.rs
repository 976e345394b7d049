use std::sync::Arc;

use tracing::{info, warn};

use course_core::model::{CourseId, Enrollment, EnrollmentId, UserId};
use storage::repository::{CourseRepository, EnrollmentRepository};

use crate::Clock;
use crate::error::EnrollmentServiceError;

/// Result of an enroll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollOutcome {
    pub enrollment: Enrollment,
    /// False when an existing enrollment was returned.
    pub created: bool,
}

/// Links learners to courses.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            enrollments,
        }
    }

    /// Enroll `learner_id` in `course_id`, returning the existing enrollment
    /// if there already is one.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the course does not exist.
    pub async fn enroll(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<EnrollOutcome, EnrollmentServiceError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(EnrollmentServiceError::NotFound);
        }

        if let Some(enrollment) = self
            .enrollments
            .find_enrollment(learner_id, course_id)
            .await?
        {
            return Ok(EnrollOutcome {
                enrollment,
                created: false,
            });
        }

        let enrollment = self
            .enrollments
            .insert_enrollment(learner_id, course_id, self.clock.now())
            .await?;
        info!(
            enrollment_id = %enrollment.id(),
            learner_id = %learner_id,
            course_id = %course_id,
            "learner enrolled"
        );
        Ok(EnrollOutcome {
            enrollment,
            created: true,
        })
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn enrollments_of(
        &self,
        learner_id: UserId,
    ) -> Result<Vec<Enrollment>, EnrollmentServiceError> {
        Ok(self.enrollments.enrollments_for_learner(learner_id).await?)
    }

    /// Delete an enrollment and its completion facts.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` for an unknown enrollment and
    /// `EnrollmentServiceError::Forbidden` if `learner_id` does not own it.
    pub async fn withdraw(
        &self,
        learner_id: UserId,
        enrollment_id: EnrollmentId,
    ) -> Result<(), EnrollmentServiceError> {
        let enrollment = self
            .enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or(EnrollmentServiceError::NotFound)?;
        if !enrollment.is_owned_by(learner_id) {
            warn!(enrollment_id = %enrollment_id, user_id = %learner_id, "rejected withdrawal");
            return Err(EnrollmentServiceError::Forbidden);
        }
        self.enrollments.delete_enrollment(enrollment_id).await?;
        info!(enrollment_id = %enrollment_id, "enrollment withdrawn");
        Ok(())
    }
}
