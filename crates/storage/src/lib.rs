#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CompletionRecord, CourseRepository, EnrollmentRepository, HierarchyReader,
    InMemoryRepository, NewCourseRecord, NewTaskRecord, NewTopicRecord, NewUnitRecord,
    NewUserRecord, ProgressPersistence, ResetRecord, Storage, StorageError, UserRepository,
};
