use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use course_core::model::{CourseId, Enrollment, EnrollmentId, TaskId, User, UserId};
use course_core::{Percentage, ProgressReport};
use storage::repository::{EnrollmentRepository, HierarchyReader, ProgressPersistence};

use crate::Clock;
use crate::error::ProgressError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of marking a task completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub enrollment_id: EnrollmentId,
    pub percentage: Percentage,
    /// False when the task had already been completed.
    pub newly_completed: bool,
}

/// Result of wiping an enrollment's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub enrollment_id: EnrollmentId,
    pub percentage: Percentage,
    pub removed: u64,
}

/// The freshly recalculated cached percentage of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecalculatedProgress {
    pub enrollment_id: EnrollmentId,
    pub percentage: Percentage,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Tracks which tasks each learner has completed and keeps the enrollment's
/// cached percentage in step.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
    hierarchy: Arc<dyn HierarchyReader>,
    progress: Arc<dyn ProgressPersistence>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        enrollments: Arc<dyn EnrollmentRepository>,
        hierarchy: Arc<dyn HierarchyReader>,
        progress: Arc<dyn ProgressPersistence>,
    ) -> Self {
        Self {
            clock,
            enrollments,
            hierarchy,
            progress,
        }
    }

    async fn enrollment_for(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressError> {
        self.enrollments
            .find_enrollment(learner_id, course_id)
            .await?
            .ok_or(ProgressError::NotEnrolled {
                learner: learner_id,
                course: course_id,
            })
    }

    async fn owned_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        actor: &User,
    ) -> Result<Enrollment, ProgressError> {
        let enrollment = self
            .enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or(ProgressError::NotFound)?;
        if !enrollment.is_owned_by(actor.id()) {
            warn!(
                enrollment_id = %enrollment_id,
                user_id = %actor.id(),
                "rejected progress change on foreign enrollment"
            );
            return Err(ProgressError::Forbidden);
        }
        Ok(enrollment)
    }

    /// Record that `learner_id` completed `task_id` in `course_id`.
    ///
    /// Completing the same task again is a no-op that reports the unchanged
    /// percentage with `newly_completed = false`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotEnrolled` if the learner has no enrollment in
    /// the course, `ProgressError::NotFound` if the task does not exist and
    /// `ProgressError::TaskCourseMismatch` if the task belongs to another course.
    pub async fn mark_task_completed(
        &self,
        learner_id: UserId,
        course_id: CourseId,
        task_id: TaskId,
    ) -> Result<CompletionOutcome, ProgressError> {
        let enrollment = self.enrollment_for(learner_id, course_id).await?;

        let placement = self
            .hierarchy
            .task_placement(task_id)
            .await?
            .ok_or(ProgressError::NotFound)?;
        if !placement.belongs_to(course_id) {
            warn!(
                task_id = %task_id,
                course_id = %course_id,
                actual_course_id = %placement.course_id,
                "task does not belong to course"
            );
            return Err(ProgressError::TaskCourseMismatch {
                task: task_id,
                course: course_id,
            });
        }

        let record = self
            .progress
            .record_completion(enrollment.id(), task_id, self.clock.now())
            .await?;

        info!(
            enrollment_id = %enrollment.id(),
            task_id = %task_id,
            newly_completed = record.newly_recorded,
            percentage = %record.completion,
            "task completion recorded"
        );

        Ok(CompletionOutcome {
            enrollment_id: enrollment.id(),
            percentage: record.completion,
            newly_completed: record.newly_recorded,
        })
    }

    /// Delete every completion of an enrollment owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown enrollment and
    /// `ProgressError::Forbidden` if `actor` does not own it.
    pub async fn reset_progress(
        &self,
        enrollment_id: EnrollmentId,
        actor: &User,
    ) -> Result<ResetOutcome, ProgressError> {
        self.owned_enrollment(enrollment_id, actor).await?;

        let reset = self.progress.reset_progress(enrollment_id).await?;
        info!(
            enrollment_id = %enrollment_id,
            removed = reset.removed,
            "progress reset"
        );

        Ok(ResetOutcome {
            enrollment_id,
            percentage: reset.completion,
            removed: reset.removed,
        })
    }

    /// Refresh the cached percentage from the current course hierarchy.
    ///
    /// Allowed for the enrollment's owner and for administrators.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown enrollment and
    /// `ProgressError::Forbidden` for anyone else.
    pub async fn recalculate(
        &self,
        enrollment_id: EnrollmentId,
        actor: &User,
    ) -> Result<RecalculatedProgress, ProgressError> {
        if !actor.is_admin() {
            self.owned_enrollment(enrollment_id, actor).await?;
        }

        let percentage = self.progress.recalculate(enrollment_id).await?;
        info!(enrollment_id = %enrollment_id, percentage = %percentage, "progress recalculated");

        Ok(RecalculatedProgress {
            enrollment_id,
            percentage,
        })
    }

    /// The course hierarchy annotated with the learner's completed tasks.
    ///
    /// Read-only: the reported percentage is the cached value.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotEnrolled` if the learner has no enrollment in
    /// the course.
    pub async fn task_status(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<ProgressReport, ProgressError> {
        let enrollment = self.enrollment_for(learner_id, course_id).await?;
        let outline = self
            .hierarchy
            .course_outline(course_id)
            .await?
            .ok_or(ProgressError::NotFound)?;

        let completed: HashSet<TaskId> = self
            .enrollments
            .completed_tasks(enrollment.id())
            .await?
            .into_iter()
            .map(|fact| fact.task_id)
            .collect();

        Ok(ProgressReport::project(&enrollment, &outline, &completed))
    }
}
