use chrono::{DateTime, Utc};
use course_core::model::{CompletedTask, CourseId, Enrollment, EnrollmentId, UserId};

use super::SqliteRepository;
use super::mapping::{
    db_err, enrollment_id_from_i64, id_i64, map_completed_task_row, map_enrollment_row,
};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO enrollments (learner_id, course_id, enrolled_at, completion_hundredths)
            VALUES (?1, ?2, ?3, 0)
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .bind(enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = enrollment_id_from_i64(res.last_insert_rowid())?;
        Ok(Enrollment::new(id, learner_id, course_id, enrolled_at))
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, course_id, enrolled_at, completion_hundredths
            FROM enrollments WHERE id = ?1
            ",
        )
        .bind(id_i64("enrollment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn find_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, course_id, enrolled_at, completion_hundredths
            FROM enrollments
            WHERE learner_id = ?1 AND course_id = ?2
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn enrollments_for_learner(
        &self,
        learner_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, learner_id, course_id, enrolled_at, completion_hundredths
            FROM enrollments
            WHERE learner_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_enrollment_row).collect()
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM enrollments WHERE id = ?1")
            .bind(id_i64("enrollment_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn completed_tasks(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<CompletedTask>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, enrollment_id, task_id, completed_at
            FROM completed_tasks
            WHERE enrollment_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("enrollment_id", enrollment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_completed_task_row).collect()
    }
}
