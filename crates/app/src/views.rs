//! JSON shapes returned by the API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use course_core::Percentage;
use course_core::model::{
    Course, CourseId, CourseOutline, Enrollment, EnrollmentId, Role, Task, TaskId, Topic,
    TopicId, Unit, UnitId, User, UserId,
};
use services::IssuedUser;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_owned(),
            full_name: user.full_name().to_owned(),
            email: user.email().to_owned(),
            role: user.role(),
            created_at: user.created_at(),
        }
    }
}

/// Returned once at user creation; the token is not retrievable later.
#[derive(Debug, Serialize)]
pub struct IssuedUserView {
    pub user: UserView,
    pub token: String,
}

impl From<&IssuedUser> for IssuedUserView {
    fn from(issued: &IssuedUser) -> Self {
        Self {
            user: UserView::from(&issued.user),
            token: issued.token.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseView {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    pub teacher_id: UserId,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id(),
            name: course.name().to_owned(),
            description: course.description().to_owned(),
            teacher_id: course.teacher_id(),
            starts_on: course.starts_on(),
            ends_on: course.ends_on(),
            active: course.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub topic_id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub due_on: NaiveDate,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            topic_id: task.topic_id(),
            title: task.title().to_owned(),
            description: task.description().map(str::to_owned),
            due_on: task.due_on(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicView {
    pub id: TopicId,
    pub unit_id: UnitId,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskView>>,
}

impl From<&Topic> for TopicView {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id(),
            unit_id: topic.unit_id(),
            name: topic.name().to_owned(),
            description: topic.description().map(str::to_owned),
            position: topic.position(),
            tasks: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnitView {
    pub id: UnitId,
    pub course_id: CourseId,
    pub name: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<TopicView>>,
}

impl From<&Unit> for UnitView {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id(),
            course_id: unit.course_id(),
            name: unit.name().to_owned(),
            position: unit.position(),
            topics: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseOutlineView {
    #[serde(flatten)]
    pub course: CourseView,
    pub total_tasks: usize,
    pub units: Vec<UnitView>,
}

impl From<&CourseOutline> for CourseOutlineView {
    fn from(outline: &CourseOutline) -> Self {
        let units = outline
            .units
            .iter()
            .map(|u| UnitView {
                topics: Some(
                    u.topics
                        .iter()
                        .map(|t| TopicView {
                            tasks: Some(t.tasks.iter().map(TaskView::from).collect()),
                            ..TopicView::from(&t.topic)
                        })
                        .collect(),
                ),
                ..UnitView::from(&u.unit)
            })
            .collect();

        Self {
            course: CourseView::from(&outline.course),
            total_tasks: outline.total_tasks(),
            units,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentView {
    pub id: EnrollmentId,
    pub learner_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub percentage: Percentage,
}

impl From<&Enrollment> for EnrollmentView {
    fn from(e: &Enrollment) -> Self {
        Self {
            id: e.id(),
            learner_id: e.learner_id(),
            course_id: e.course_id(),
            enrolled_at: e.enrolled_at(),
            percentage: e.completion(),
        }
    }
}
