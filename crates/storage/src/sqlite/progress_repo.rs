use chrono::{DateTime, Utc};
use course_core::model::{EnrollmentId, TaskId};
use course_core::{Percentage, completion_percentage};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, ser};
use crate::repository::{CompletionRecord, ProgressPersistence, ResetRecord, StorageError};

/// Claim the enrollment row so the transaction holds the write lock before
/// it reads any counts.
async fn touch_enrollment(
    conn: &mut SqliteConnection,
    enrollment_id: i64,
) -> Result<(), StorageError> {
    let res = sqlx::query(
        "UPDATE enrollments SET completion_hundredths = completion_hundredths WHERE id = ?1",
    )
    .bind(enrollment_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

/// Count course tasks and this enrollment's completions among them, then
/// persist the derived percentage. Facts for tasks outside the course are
/// ignored.
async fn recalculate_in(
    conn: &mut SqliteConnection,
    enrollment_id: i64,
) -> Result<Percentage, StorageError> {
    let row = sqlx::query(
        r"
        SELECT
            (
                SELECT COUNT(*)
                FROM tasks k
                JOIN topics t ON t.id = k.topic_id
                JOIN units u ON u.id = t.unit_id
                WHERE u.course_id = e.course_id
            ) AS total,
            (
                SELECT COUNT(*)
                FROM completed_tasks c
                JOIN tasks k ON k.id = c.task_id
                JOIN topics t ON t.id = k.topic_id
                JOIN units u ON u.id = t.unit_id
                WHERE c.enrollment_id = e.id AND u.course_id = e.course_id
            ) AS done
        FROM enrollments e
        WHERE e.id = ?1
        ",
    )
    .bind(enrollment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or(StorageError::NotFound)?;

    let total: i64 = row.try_get("total").map_err(ser)?;
    let done: i64 = row.try_get("done").map_err(ser)?;
    let completion = completion_percentage(
        u64::try_from(done).map_err(ser)?,
        u64::try_from(total).map_err(ser)?,
    );

    sqlx::query("UPDATE enrollments SET completion_hundredths = ?1 WHERE id = ?2")
        .bind(i64::from(completion.hundredths()))
        .bind(enrollment_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    Ok(completion)
}

#[async_trait::async_trait]
impl ProgressPersistence for SqliteRepository {
    async fn record_completion(
        &self,
        enrollment_id: EnrollmentId,
        task_id: TaskId,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionRecord, StorageError> {
        let enrollment_id = id_i64("enrollment_id", enrollment_id.value())?;
        let task_id = id_i64("task_id", task_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        touch_enrollment(&mut tx, enrollment_id).await?;

        let res = sqlx::query(
            r"
            INSERT INTO completed_tasks (enrollment_id, task_id, completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(enrollment_id, task_id) DO NOTHING
            ",
        )
        .bind(enrollment_id)
        .bind(task_id)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let completion = recalculate_in(&mut tx, enrollment_id).await?;

        tx.commit().await.map_err(db_err)?;

        Ok(CompletionRecord {
            newly_recorded: res.rows_affected() == 1,
            completion,
        })
    }

    async fn recalculate(&self, enrollment_id: EnrollmentId) -> Result<Percentage, StorageError> {
        let enrollment_id = id_i64("enrollment_id", enrollment_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        touch_enrollment(&mut tx, enrollment_id).await?;
        let completion = recalculate_in(&mut tx, enrollment_id).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(completion)
    }

    async fn reset_progress(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<ResetRecord, StorageError> {
        let enrollment_id = id_i64("enrollment_id", enrollment_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query("UPDATE enrollments SET completion_hundredths = 0 WHERE id = ?1")
            .bind(enrollment_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let deleted = sqlx::query("DELETE FROM completed_tasks WHERE enrollment_id = ?1")
            .bind(enrollment_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(ResetRecord {
            removed: deleted.rows_affected(),
            completion: Percentage::ZERO,
        })
    }
}
