mod course;
mod enrollment;
mod hierarchy;
mod ids;
mod user;

pub use ids::{
    CompletedTaskId, CourseId, EnrollmentId, ParseIdError, TaskId, TopicId, UnitId, UserId,
};

pub use course::{Course, CourseDetails, CourseError, MAX_NAME_LEN};
pub use enrollment::{CompletedTask, Enrollment};
pub use hierarchy::{
    CourseOutline, HierarchyError, Task, TaskDetails, TaskPlacement, Topic, TopicDetails,
    TopicOutline, Unit, UnitDetails, UnitOutline,
};
pub use user::{ApiToken, Role, User, UserError, UserProfile};
