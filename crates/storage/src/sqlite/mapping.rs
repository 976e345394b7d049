use chrono::{DateTime, NaiveDate, Utc};
use course_core::Percentage;
use course_core::model::{
    CompletedTask, CompletedTaskId, Course, CourseId, Enrollment, EnrollmentId, Role, Task,
    TaskId, Topic, TopicId, Unit, UnitId, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Translate driver failures, surfacing constraint violations as domain errors.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn unit_id_from_i64(v: i64) -> Result<UnitId, StorageError> {
    Ok(UnitId::new(i64_to_u64("unit_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn task_id_from_i64(v: i64) -> Result<TaskId, StorageError> {
    Ok(TaskId::new(i64_to_u64("task_id", v)?))
}

pub(crate) fn enrollment_id_from_i64(v: i64) -> Result<EnrollmentId, StorageError> {
    Ok(EnrollmentId::new(i64_to_u64("enrollment_id", v)?))
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    User::new(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("username").map_err(ser)?,
        row.try_get::<String, _>("full_name").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
        Role::parse(&role).map_err(ser)?,
        row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Course::new(
        course_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        user_id_from_i64(row.try_get("teacher_id").map_err(ser)?)?,
        row.try_get::<NaiveDate, _>("starts_on").map_err(ser)?,
        row.try_get::<NaiveDate, _>("ends_on").map_err(ser)?,
        row.try_get::<bool, _>("active").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_unit_row(row: &SqliteRow) -> Result<Unit, StorageError> {
    Unit::new(
        unit_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<i32, _>("position").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Topic::new(
        topic_id_from_i64(row.try_get("id").map_err(ser)?)?,
        unit_id_from_i64(row.try_get("unit_id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description")
            .map_err(ser)?,
        row.try_get::<i32, _>("position").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_task_row(row: &SqliteRow) -> Result<Task, StorageError> {
    Task::new(
        task_id_from_i64(row.try_get("id").map_err(ser)?)?,
        topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description")
            .map_err(ser)?,
        row.try_get::<NaiveDate, _>("due_on").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let hundredths: i64 = row.try_get("completion_hundredths").map_err(ser)?;
    Ok(Enrollment::from_persisted(
        enrollment_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("learner_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get::<DateTime<Utc>, _>("enrolled_at").map_err(ser)?,
        Percentage::from_hundredths(hundredths).map_err(ser)?,
    ))
}

pub(crate) fn map_completed_task_row(row: &SqliteRow) -> Result<CompletedTask, StorageError> {
    Ok(CompletedTask {
        id: CompletedTaskId::new(i64_to_u64(
            "completed_task_id",
            row.try_get("id").map_err(ser)?,
        )?),
        enrollment_id: enrollment_id_from_i64(row.try_get("enrollment_id").map_err(ser)?)?,
        task_id: task_id_from_i64(row.try_get("task_id").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            task_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(course_id_from_i64(7).unwrap(), CourseId::new(7));
    }

    #[test]
    fn oversized_ids_do_not_bind() {
        assert!(id_i64("task_id", u64::MAX).is_err());
        assert_eq!(id_i64("task_id", 42).unwrap(), 42);
    }
}
