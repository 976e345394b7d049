use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use course_core::model::{CourseId, EnrollmentId};
use services::{RecalculatedProgress, ResetOutcome};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::state::AppState;
use crate::views::EnrollmentView;

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
    pub course_id: CourseId,
}

/// GET /api/enrollments: the caller's enrollments.
pub async fn list_mine(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<EnrollmentView>>, AppError> {
    let enrollments = app.services.enrollments().enrollments_of(user.id()).await?;
    Ok(Json(enrollments.iter().map(EnrollmentView::from).collect()))
}

/// POST /api/enrollments: 201 when created, 200 when already enrolled.
pub async fn enroll(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<EnrollBody>,
) -> Result<(StatusCode, Json<EnrollmentView>), AppError> {
    let outcome = app
        .services
        .enrollments()
        .enroll(user.id(), body.course_id)
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(EnrollmentView::from(&outcome.enrollment))))
}

/// DELETE /api/enrollments/{enrollment_id}
pub async fn withdraw(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<StatusCode, AppError> {
    app.services
        .enrollments()
        .withdraw(user.id(), enrollment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/enrollments/{enrollment_id}/reset
pub async fn reset(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<Json<ResetOutcome>, AppError> {
    let outcome = app
        .services
        .progress()
        .reset_progress(enrollment_id, &user)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/enrollments/{enrollment_id}/recalculate
pub async fn recalculate(
    State(app): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<Json<RecalculatedProgress>, AppError> {
    let outcome = app
        .services
        .progress()
        .recalculate(enrollment_id, &user)
        .await?;
    Ok(Json(outcome))
}
