use axum::extract::State;
use serde::Deserialize;

use course_core::ProgressReport;
use course_core::model::{CourseId, TaskId};
use services::CompletionOutcome;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub course_id: CourseId,
    pub task_id: TaskId,
}

/// POST /api/progress/complete
pub async fn complete(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CompleteBody>,
) -> Result<Json<CompletionOutcome>, AppError> {
    let outcome = app
        .services
        .progress()
        .mark_task_completed(user.id(), body.course_id, body.task_id)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/progress/courses/{course_id}
pub async fn status(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Json<ProgressReport>, AppError> {
    let report = app
        .services
        .progress()
        .task_status(user.id(), course_id)
        .await?;
    Ok(Json(report))
}
