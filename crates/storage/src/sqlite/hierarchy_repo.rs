use course_core::model::{
    CourseId, CourseOutline, Task, TaskId, TaskPlacement, Topic, TopicId, Unit, UnitId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    course_id_from_i64, db_err, id_i64, map_course_row, map_task_row, map_topic_row,
    map_unit_row, ser, topic_id_from_i64, unit_id_from_i64,
};
use crate::repository::{HierarchyReader, StorageError};

#[async_trait::async_trait]
impl HierarchyReader for SqliteRepository {
    async fn course_outline(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let course_id = id_i64("course_id", id.value())?;

        let Some(course_row) = sqlx::query(
            r"
            SELECT id, name, description, teacher_id, starts_on, ends_on, active
            FROM courses WHERE id = ?1
            ",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        else {
            return Ok(None);
        };
        let course = map_course_row(&course_row)?;

        let unit_rows = sqlx::query(
            r"
            SELECT id, course_id, name, position
            FROM units
            WHERE course_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let topic_rows = sqlx::query(
            r"
            SELECT t.id, t.unit_id, t.name, t.description, t.position
            FROM topics t
            JOIN units u ON u.id = t.unit_id
            WHERE u.course_id = ?1
            ORDER BY t.position ASC, t.id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let task_rows = sqlx::query(
            r"
            SELECT k.id, k.topic_id, k.title, k.description, k.due_on
            FROM tasks k
            JOIN topics t ON t.id = k.topic_id
            JOIN units u ON u.id = t.unit_id
            WHERE u.course_id = ?1
            ORDER BY k.id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let units = unit_rows
            .iter()
            .map(map_unit_row)
            .collect::<Result<Vec<_>, _>>()?;
        let topics = topic_rows
            .iter()
            .map(map_topic_row)
            .collect::<Result<Vec<_>, _>>()?;
        let tasks = task_rows
            .iter()
            .map(map_task_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CourseOutline::assemble(course, units, topics, tasks)))
    }

    async fn task_placement(&self, id: TaskId) -> Result<Option<TaskPlacement>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT k.topic_id, t.unit_id, u.course_id
            FROM tasks k
            JOIN topics t ON t.id = k.topic_id
            JOIN units u ON u.id = t.unit_id
            WHERE k.id = ?1
            ",
        )
        .bind(id_i64("task_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(TaskPlacement {
            task_id: id,
            topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
            unit_id: unit_id_from_i64(row.try_get("unit_id").map_err(ser)?)?,
            course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        }))
    }

    async fn units_of_course(&self, id: CourseId) -> Result<Vec<Unit>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, name, position
            FROM units
            WHERE course_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_unit_row).collect()
    }

    async fn topics_of_unit(&self, id: UnitId) -> Result<Vec<Topic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, unit_id, name, description, position
            FROM topics
            WHERE unit_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("unit_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_topic_row).collect()
    }

    async fn tasks_of_topic(&self, id: TopicId) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic_id, title, description, due_on
            FROM tasks
            WHERE topic_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("topic_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_task_row).collect()
    }
}
