use axum::extract::State;
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;

use course_core::model::{CourseId, TaskId, TopicId, UnitId, UserId};
use services::{CourseDraft, SectionDraft};

use super::ListQuery;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;
use crate::views::{CourseOutlineView, CourseView, TaskView, TopicView, UnitView};

fn default_active() -> bool {
    true
}

/// `?limit=&teacher_id=` for the course list.
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub limit: Option<u32>,
    pub teacher_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct CourseBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub teacher_id: Option<UserId>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SectionBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
}

impl From<SectionBody> for SectionDraft {
    fn from(body: SectionBody) -> Self {
        Self {
            name: body.name,
            description: body.description,
            position: body.position,
        }
    }
}

impl From<CourseBody> for CourseDraft {
    fn from(body: CourseBody) -> Self {
        Self {
            name: body.name,
            description: body.description,
            teacher_id: body.teacher_id,
            starts_on: body.starts_on,
            ends_on: body.ends_on,
            active: body.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
    pub title: String,
    pub description: Option<String>,
    pub due_on: NaiveDate,
}

impl TaskBody {
    fn into_parts(self) -> (SectionDraft, NaiveDate) {
        let draft = SectionDraft {
            name: self.title,
            description: self.description,
            position: 0,
        };
        (draft, self.due_on)
    }
}

/// GET /api/courses, optionally only those taught by `teacher_id`.
pub async fn list_courses(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<CourseView>>, AppError> {
    let limit = ListQuery { limit: query.limit }.limit();
    let courses = match query.teacher_id {
        Some(teacher_id) => {
            app.services
                .courses()
                .courses_by_teacher(teacher_id, limit)
                .await?
        }
        None => app.services.courses().list_courses(limit).await?,
    };
    Ok(Json(courses.iter().map(CourseView::from).collect()))
}

/// POST /api/courses: teachers and admins.
pub async fn create_course(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<CourseBody>,
) -> Result<(StatusCode, Json<CourseView>), AppError> {
    let course = app
        .services
        .courses()
        .create_course(&actor, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(CourseView::from(&course))))
}

/// PUT /api/courses/{course_id}: owner or admin; only admins may change the
/// teacher.
pub async fn update_course(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(course_id): Path<CourseId>,
    Json(body): Json<CourseBody>,
) -> Result<Json<CourseView>, AppError> {
    let course = app
        .services
        .courses()
        .update_course(&actor, course_id, body.into())
        .await?;
    Ok(Json(CourseView::from(&course)))
}

/// GET /api/courses/{course_id}: the full unit → topic → task tree.
pub async fn get_course(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Json<CourseOutlineView>, AppError> {
    let outline = app.services.courses().outline(course_id).await?;
    Ok(Json(CourseOutlineView::from(&outline)))
}

/// DELETE /api/courses/{course_id}
pub async fn delete_course(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<StatusCode, AppError> {
    app.services
        .courses()
        .delete_course(&actor, course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/courses/{course_id}/units
pub async fn list_units(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Json<Vec<UnitView>>, AppError> {
    let units = app.services.courses().units_of(course_id).await?;
    Ok(Json(units.iter().map(UnitView::from).collect()))
}

/// POST /api/courses/{course_id}/units
pub async fn create_unit(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(course_id): Path<CourseId>,
    Json(body): Json<SectionBody>,
) -> Result<(StatusCode, Json<UnitView>), AppError> {
    let unit = app
        .services
        .courses()
        .create_unit(&actor, course_id, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(UnitView::from(&unit))))
}

/// PUT /api/units/{unit_id}
pub async fn update_unit(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(unit_id): Path<UnitId>,
    Json(body): Json<SectionBody>,
) -> Result<Json<UnitView>, AppError> {
    let unit = app
        .services
        .courses()
        .update_unit(&actor, unit_id, body.into())
        .await?;
    Ok(Json(UnitView::from(&unit)))
}

/// GET /api/units/{unit_id}/topics
pub async fn list_topics(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(unit_id): Path<UnitId>,
) -> Result<Json<Vec<TopicView>>, AppError> {
    let topics = app.services.courses().topics_of(unit_id).await?;
    Ok(Json(topics.iter().map(TopicView::from).collect()))
}

/// POST /api/units/{unit_id}/topics
pub async fn create_topic(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(unit_id): Path<UnitId>,
    Json(body): Json<SectionBody>,
) -> Result<(StatusCode, Json<TopicView>), AppError> {
    let topic = app
        .services
        .courses()
        .create_topic(&actor, unit_id, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(TopicView::from(&topic))))
}

/// PUT /api/topics/{topic_id}
pub async fn update_topic(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(topic_id): Path<TopicId>,
    Json(body): Json<SectionBody>,
) -> Result<Json<TopicView>, AppError> {
    let topic = app
        .services
        .courses()
        .update_topic(&actor, topic_id, body.into())
        .await?;
    Ok(Json(TopicView::from(&topic)))
}

/// GET /api/topics/{topic_id}/tasks
pub async fn list_tasks(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(topic_id): Path<TopicId>,
) -> Result<Json<Vec<TaskView>>, AppError> {
    let tasks = app.services.courses().tasks_of(topic_id).await?;
    Ok(Json(tasks.iter().map(TaskView::from).collect()))
}

/// POST /api/topics/{topic_id}/tasks
pub async fn create_task(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(topic_id): Path<TopicId>,
    Json(body): Json<TaskBody>,
) -> Result<(StatusCode, Json<TaskView>), AppError> {
    let (draft, due_on) = body.into_parts();
    let task = app
        .services
        .courses()
        .create_task(&actor, topic_id, draft, due_on)
        .await?;
    Ok((StatusCode::CREATED, Json(TaskView::from(&task))))
}

/// PUT /api/tasks/{task_id}: completion facts for the task are kept.
pub async fn update_task(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(task_id): Path<TaskId>,
    Json(body): Json<TaskBody>,
) -> Result<Json<TaskView>, AppError> {
    let (draft, due_on) = body.into_parts();
    let task = app
        .services
        .courses()
        .update_task(&actor, task_id, draft, due_on)
        .await?;
    Ok(Json(TaskView::from(&task)))
}

/// DELETE /api/units/{unit_id}
pub async fn delete_unit(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(unit_id): Path<UnitId>,
) -> Result<StatusCode, AppError> {
    app.services.courses().delete_unit(&actor, unit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/topics/{topic_id}
pub async fn delete_topic(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(topic_id): Path<TopicId>,
) -> Result<StatusCode, AppError> {
    app.services.courses().delete_topic(&actor, topic_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/tasks/{task_id}
pub async fn delete_task(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, AppError> {
    app.services.courses().delete_task(&actor, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
