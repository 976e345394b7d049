use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::course_service::CourseService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::user_service::UserService;

/// Assembles the services the HTTP layer depends on.
#[derive(Clone)]
pub struct AppServices {
    users: Arc<UserService>,
    courses: Arc<CourseService>,
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services backed by the in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let users = Arc::new(UserService::new(clock, Arc::clone(&storage.users)));
        let courses = Arc::new(CourseService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.hierarchy),
        ));
        let enrollments = Arc::new(EnrollmentService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.hierarchy),
            Arc::clone(&storage.progress),
        ));

        Self {
            users,
            courses,
            enrollments,
            progress,
        }
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
