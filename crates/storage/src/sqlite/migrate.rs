use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'teacher', 'student')),
            api_token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL CHECK (length(name) BETWEEN 1 AND 100),
            description TEXT NOT NULL DEFAULT '',
            teacher_id INTEGER NOT NULL,
            starts_on TEXT NOT NULL,
            ends_on TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            CHECK (starts_on <= ends_on),
            FOREIGN KEY (teacher_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS units (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            position INTEGER NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY,
            unit_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            position INTEGER NOT NULL,
            FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            topic_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            due_on TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            enrolled_at TEXT NOT NULL,
            completion_hundredths INTEGER NOT NULL DEFAULT 0
                CHECK (completion_hundredths BETWEEN 0 AND 10000),
            FOREIGN KEY (learner_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS completed_tasks (
            id INTEGER PRIMARY KEY,
            enrollment_id INTEGER NOT NULL,
            task_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE,
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_completed_tasks_enrollment_task
            ON completed_tasks (enrollment_id, task_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_enrollments_learner_course
            ON enrollments (learner_id, course_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_units_course_position
            ON units (course_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_topics_unit_position
            ON topics (unit_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_tasks_topic
            ON tasks (topic_id, id);
    ",
];

/// Runs versioned migrations for the current schema.
///
/// Version 1 creates users, the course hierarchy, enrollments and completion
/// facts. Every foreign key cascades on delete.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
