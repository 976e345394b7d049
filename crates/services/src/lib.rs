#![forbid(unsafe_code)]

pub mod app_services;
pub mod course_service;
pub mod enrollment_service;
pub mod error;
pub mod progress_service;
pub mod seed;
pub mod user_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use course_service::{CourseDraft, CourseService, SectionDraft};
pub use enrollment_service::{EnrollOutcome, EnrollmentService};
pub use error::{
    AppServicesError, CourseServiceError, EnrollmentServiceError, ProgressError,
    UserServiceError,
};
pub use progress_service::{
    CompletionOutcome, ProgressService, RecalculatedProgress, ResetOutcome,
};
pub use seed::{SeededUser, ensure_default_users};
pub use user_service::{IssuedUser, UserDraft, UserService};
