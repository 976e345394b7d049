use course_core::model::{
    Course, CourseId, Task, TaskId, Topic, TopicId, Unit, UnitId, UserId,
};
use sqlx::sqlite::SqliteQueryResult;

use super::SqliteRepository;
use super::mapping::{
    course_id_from_i64, db_err, id_i64, map_course_row, map_task_row, map_topic_row,
    map_unit_row, task_id_from_i64, topic_id_from_i64, unit_id_from_i64,
};
use crate::repository::{
    CourseRepository, NewCourseRecord, NewTaskRecord, NewTopicRecord, NewUnitRecord, StorageError,
};

const COURSE_COLUMNS: &str = "id, name, description, teacher_id, starts_on, ends_on, active";

fn require_row(res: &SqliteQueryResult) -> Result<(), StorageError> {
    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

impl SqliteRepository {
    /// Delete one row by id from `table`, mapping zero affected rows to `NotFound`.
    pub(super) async fn delete_by_id(
        &self,
        table: &'static str,
        id: i64,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        require_row(&res)
    }
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO courses (name, description, teacher_id, starts_on, ends_on, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(course.name)
        .bind(course.description)
        .bind(id_i64("teacher_id", course.teacher_id.value())?)
        .bind(course.starts_on)
        .bind(course.ends_on)
        .bind(course.active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        course_id_from_i64(res.last_insert_rowid())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"
        ))
        .bind(id_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id ASC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_course_row).collect()
    }

    async fn courses_by_teacher(
        &self,
        teacher_id: UserId,
        limit: u32,
    ) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE teacher_id = ?1 ORDER BY id ASC LIMIT ?2"
        ))
        .bind(id_i64("teacher_id", teacher_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_course_row).collect()
    }

    async fn update_course(&self, course: &Course) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE courses
            SET name = ?1, description = ?2, teacher_id = ?3,
                starts_on = ?4, ends_on = ?5, active = ?6
            WHERE id = ?7
            ",
        )
        .bind(course.name())
        .bind(course.description())
        .bind(id_i64("teacher_id", course.teacher_id().value())?)
        .bind(course.starts_on())
        .bind(course.ends_on())
        .bind(course.is_active())
        .bind(id_i64("course_id", course.id().value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        require_row(&res)
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        self.delete_by_id("courses", id_i64("course_id", id.value())?)
            .await
    }

    async fn insert_unit(&self, unit: NewUnitRecord) -> Result<UnitId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO units (course_id, name, position)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("course_id", unit.course_id.value())?)
        .bind(unit.name)
        .bind(unit.position)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        unit_id_from_i64(res.last_insert_rowid())
    }

    async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, StorageError> {
        let row = sqlx::query("SELECT id, course_id, name, position FROM units WHERE id = ?1")
            .bind(id_i64("unit_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_unit_row).transpose()
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE units SET name = ?1, position = ?2 WHERE id = ?3")
            .bind(unit.name())
            .bind(unit.position())
            .bind(id_i64("unit_id", unit.id().value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        require_row(&res)
    }

    async fn delete_unit(&self, id: UnitId) -> Result<(), StorageError> {
        self.delete_by_id("units", id_i64("unit_id", id.value())?)
            .await
    }

    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO topics (unit_id, name, description, position)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("unit_id", topic.unit_id.value())?)
        .bind(topic.name)
        .bind(topic.description)
        .bind(topic.position)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        topic_id_from_i64(res.last_insert_rowid())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            "SELECT id, unit_id, name, description, position FROM topics WHERE id = ?1",
        )
        .bind(id_i64("topic_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE topics SET name = ?1, description = ?2, position = ?3 WHERE id = ?4",
        )
        .bind(topic.name())
        .bind(topic.description())
        .bind(topic.position())
        .bind(id_i64("topic_id", topic.id().value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        require_row(&res)
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        self.delete_by_id("topics", id_i64("topic_id", id.value())?)
            .await
    }

    async fn insert_task(&self, task: NewTaskRecord) -> Result<TaskId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO tasks (topic_id, title, description, due_on)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("topic_id", task.topic_id.value())?)
        .bind(task.title)
        .bind(task.description)
        .bind(task.due_on)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        task_id_from_i64(res.last_insert_rowid())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StorageError> {
        let row = sqlx::query(
            "SELECT id, topic_id, title, description, due_on FROM tasks WHERE id = ?1",
        )
        .bind(id_i64("task_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_task_row).transpose()
    }

    async fn update_task(&self, task: &Task) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE tasks SET title = ?1, description = ?2, due_on = ?3 WHERE id = ?4",
        )
        .bind(task.title())
        .bind(task.description())
        .bind(task.due_on())
        .bind(id_i64("task_id", task.id().value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        require_row(&res)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StorageError> {
        self.delete_by_id("tasks", id_i64("task_id", id.value())?)
            .await
    }
}
