use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use services::{CourseServiceError, EnrollmentServiceError, ProgressError, UserServiceError};
use storage::repository::StorageError;

// ---------------------------------------------------------------------------
// Sentinels for failures raised by the HTTP layer itself
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Unauthorized(&'static str);

impl std::fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Unauthorized {}

#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadRequest {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Responds with `{"error": <message>, "code": <stable code>}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// 401 for a missing or unknown bearer token.
    pub fn unauthorized(msg: &'static str) -> Self {
        Self(Unauthorized(msg).into())
    }

    /// 400 for malformed input the services never see.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }

    fn storage_status(err: &StorageError) -> (StatusCode, &'static str) {
        match err {
            StorageError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            StorageError::Conflict => (StatusCode::CONFLICT, "conflict"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        }
    }

    /// HTTP status and stable error code for the wrapped error.
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str) {
        let err = &self.0;
        if err.downcast_ref::<Unauthorized>().is_some() {
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
        if err.downcast_ref::<BadRequest>().is_some() {
            return (StatusCode::BAD_REQUEST, "invalid_input");
        }
        if let Some(e) = err.downcast_ref::<ProgressError>() {
            return match e {
                ProgressError::NotEnrolled { .. } => (StatusCode::NOT_FOUND, "not_enrolled"),
                ProgressError::TaskCourseMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "task_course_mismatch")
                }
                ProgressError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                ProgressError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
                ProgressError::Storage(s) => Self::storage_status(s),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            };
        }
        if let Some(e) = err.downcast_ref::<CourseServiceError>() {
            return match e {
                CourseServiceError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                CourseServiceError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
                CourseServiceError::InvalidTeacher(_) | CourseServiceError::Invalid(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_input")
                }
                CourseServiceError::Storage(s) => Self::storage_status(s),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            };
        }
        if let Some(e) = err.downcast_ref::<EnrollmentServiceError>() {
            return match e {
                EnrollmentServiceError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                EnrollmentServiceError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
                EnrollmentServiceError::Storage(s) => Self::storage_status(s),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            };
        }
        if let Some(e) = err.downcast_ref::<UserServiceError>() {
            return match e {
                UserServiceError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
                UserServiceError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                UserServiceError::UsernameTaken(_) => (StatusCode::CONFLICT, "conflict"),
                UserServiceError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                UserServiceError::Storage(s) => Self::storage_status(s),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            };
        }
        if let Some(e) = err.downcast_ref::<StorageError>() {
            return Self::storage_status(e);
        }
        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::error!(code, error = %self.0, "request failed");
        }
        let body = json!({ "error": self.0.to_string(), "code": code });
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CourseId, HierarchyError, TaskId, UserId};

    fn status_of(err: impl Into<anyhow::Error>) -> (StatusCode, &'static str) {
        AppError(err.into()).classify()
    }

    #[test]
    fn not_enrolled_maps_to_404() {
        let err = ProgressError::NotEnrolled {
            learner: UserId::new(1),
            course: CourseId::new(2),
        };
        assert_eq!(status_of(err), (StatusCode::NOT_FOUND, "not_enrolled"));
    }

    #[test]
    fn task_course_mismatch_maps_to_400() {
        let err = ProgressError::TaskCourseMismatch {
            task: TaskId::new(1),
            course: CourseId::new(2),
        };
        assert_eq!(
            status_of(err),
            (StatusCode::BAD_REQUEST, "task_course_mismatch")
        );
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(
            status_of(ProgressError::Forbidden),
            (StatusCode::FORBIDDEN, "forbidden")
        );
        assert_eq!(
            status_of(CourseServiceError::Forbidden),
            (StatusCode::FORBIDDEN, "forbidden")
        );
    }

    #[test]
    fn validation_maps_to_400() {
        let err = CourseServiceError::from(HierarchyError::EmptyTaskTitle);
        assert_eq!(status_of(err), (StatusCode::BAD_REQUEST, "invalid_input"));
    }

    #[test]
    fn duplicate_username_maps_to_409() {
        let err = UserServiceError::UsernameTaken("kim".into());
        assert_eq!(status_of(err), (StatusCode::CONFLICT, "conflict"));
    }

    #[test]
    fn storage_failure_maps_to_500() {
        let err = ProgressError::Storage(StorageError::Connection("gone".into()));
        assert_eq!(
            status_of(err),
            (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
        );
    }

    #[test]
    fn bad_request_constructor_maps_to_invalid_input() {
        assert_eq!(
            AppError::bad_request("expected a number").classify(),
            (StatusCode::BAD_REQUEST, "invalid_input")
        );
        assert_eq!(
            status_of(UserServiceError::NotFound),
            (StatusCode::NOT_FOUND, "not_found")
        );
    }

    #[test]
    fn unauthorized_constructor_maps_to_401() {
        let response = AppError::unauthorized("missing bearer token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
