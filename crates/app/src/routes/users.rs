use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use course_core::model::{Role, UserId};
use services::UserDraft;

use super::ListQuery;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;
use crate::views::{IssuedUserView, UserView};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

impl From<RegisterBody> for UserDraft {
    fn from(body: RegisterBody) -> Self {
        Self {
            username: body.username,
            full_name: body.full_name,
            email: body.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    #[serde(flatten)]
    pub user: RegisterBody,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
    #[serde(flatten)]
    pub user: RegisterBody,
    pub role: Option<Role>,
}

/// POST /api/register: public self-registration as a student.
pub async fn register(
    State(app): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<IssuedUserView>), AppError> {
    let issued = app.services.users().register_student(body.into()).await?;
    Ok((StatusCode::CREATED, Json(IssuedUserView::from(&issued))))
}

/// GET /api/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(UserView::from(&user))
}

/// GET /api/users: admin only.
pub async fn list_users(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let users = app
        .services
        .users()
        .list_users(&actor, query.limit())
        .await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

/// POST /api/users: admin only, any role.
pub async fn create_user(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<IssuedUserView>), AppError> {
    let issued = app
        .services
        .users()
        .create_user(&actor, body.user.into(), body.role)
        .await?;
    Ok((StatusCode::CREATED, Json(IssuedUserView::from(&issued))))
}

/// GET /api/users/{user_id}: admins, or the user themselves.
pub async fn get_user(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserView>, AppError> {
    let user = app.services.users().get_user(&actor, user_id).await?;
    Ok(Json(UserView::from(&user)))
}

/// PUT /api/users/{user_id}: admins, or the user themselves without a role
/// change.
pub async fn update_user(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<UserId>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<UserView>, AppError> {
    let user = app
        .services
        .users()
        .update_user(&actor, user_id, body.user.into(), body.role)
        .await?;
    Ok(Json(UserView::from(&user)))
}

/// DELETE /api/users/{user_id}: admin only; removes the courses the user
/// teaches and their enrollments.
pub async fn delete_user(
    State(app): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    app.services.users().delete_user(&actor, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
