use chrono::NaiveDate;
use thiserror::Error;

use crate::model::course::Course;
use crate::model::ids::{CourseId, TaskId, TopicId, UnitId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HierarchyError {
    #[error("unit name cannot be empty")]
    EmptyUnitName,

    #[error("topic name cannot be empty")]
    EmptyTopicName,

    #[error("task title cannot be empty")]
    EmptyTaskTitle,
}

fn non_blank(value: impl Into<String>, err: HierarchyError) -> Result<String, HierarchyError> {
    let value = value.into().trim().to_owned();
    if value.is_empty() { Err(err) } else { Ok(value) }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

//
// ─── UNIT ──────────────────────────────────────────────────────────────────────
//

/// Validated unit fields, before storage assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDetails {
    name: String,
    position: i32,
}

impl UnitDetails {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyUnitName` if the name is blank.
    pub fn new(name: impl Into<String>, position: i32) -> Result<Self, HierarchyError> {
        Ok(Self {
            name: non_blank(name, HierarchyError::EmptyUnitName)?,
            position,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn position(&self) -> i32 {
        self.position
    }
}

/// An ordered section of a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    id: UnitId,
    course_id: CourseId,
    details: UnitDetails,
}

impl Unit {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyUnitName` if the name is blank.
    pub fn new(
        id: UnitId,
        course_id: CourseId,
        name: impl Into<String>,
        position: i32,
    ) -> Result<Self, HierarchyError> {
        Ok(Self::from_details(
            id,
            course_id,
            UnitDetails::new(name, position)?,
        ))
    }

    #[must_use]
    pub fn from_details(id: UnitId, course_id: CourseId, details: UnitDetails) -> Self {
        Self {
            id,
            course_id,
            details,
        }
    }

    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.details.name()
    }

    #[must_use]
    pub fn position(&self) -> i32 {
        self.details.position()
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// Validated topic fields, before storage assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDetails {
    name: String,
    description: Option<String>,
    position: i32,
}

impl TopicDetails {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyTopicName` if the name is blank.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        position: i32,
    ) -> Result<Self, HierarchyError> {
        Ok(Self {
            name: non_blank(name, HierarchyError::EmptyTopicName)?,
            description: optional_text(description),
            position,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn position(&self) -> i32 {
        self.position
    }
}

/// An ordered section of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    id: TopicId,
    unit_id: UnitId,
    details: TopicDetails,
}

impl Topic {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyTopicName` if the name is blank.
    pub fn new(
        id: TopicId,
        unit_id: UnitId,
        name: impl Into<String>,
        description: Option<String>,
        position: i32,
    ) -> Result<Self, HierarchyError> {
        Ok(Self::from_details(
            id,
            unit_id,
            TopicDetails::new(name, description, position)?,
        ))
    }

    #[must_use]
    pub fn from_details(id: TopicId, unit_id: UnitId, details: TopicDetails) -> Self {
        Self {
            id,
            unit_id,
            details,
        }
    }

    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.details.name()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.details.description()
    }

    #[must_use]
    pub fn position(&self) -> i32 {
        self.details.position()
    }
}

//
// ─── TASK ──────────────────────────────────────────────────────────────────────
//

/// Validated task fields, before storage assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetails {
    title: String,
    description: Option<String>,
    due_on: NaiveDate,
}

impl TaskDetails {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyTaskTitle` if the title is blank.
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        due_on: NaiveDate,
    ) -> Result<Self, HierarchyError> {
        Ok(Self {
            title: non_blank(title, HierarchyError::EmptyTaskTitle)?,
            description: optional_text(description),
            due_on,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn due_on(&self) -> NaiveDate {
        self.due_on
    }
}

/// A piece of work a learner can mark as completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    topic_id: TopicId,
    details: TaskDetails,
}

impl Task {
    /// # Errors
    ///
    /// Returns `HierarchyError::EmptyTaskTitle` if the title is blank.
    pub fn new(
        id: TaskId,
        topic_id: TopicId,
        title: impl Into<String>,
        description: Option<String>,
        due_on: NaiveDate,
    ) -> Result<Self, HierarchyError> {
        Ok(Self::from_details(
            id,
            topic_id,
            TaskDetails::new(title, description, due_on)?,
        ))
    }

    #[must_use]
    pub fn from_details(id: TaskId, topic_id: TopicId, details: TaskDetails) -> Self {
        Self {
            id,
            topic_id,
            details,
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.details.title()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.details.description()
    }

    #[must_use]
    pub fn due_on(&self) -> NaiveDate {
        self.details.due_on()
    }
}

//
// ─── PLACEMENT ─────────────────────────────────────────────────────────────────
//

/// Where a task sits in the hierarchy: Task → Topic → Unit → Course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlacement {
    pub task_id: TaskId,
    pub topic_id: TopicId,
    pub unit_id: UnitId,
    pub course_id: CourseId,
}

impl TaskPlacement {
    #[must_use]
    pub fn belongs_to(&self, course_id: CourseId) -> bool {
        self.course_id == course_id
    }
}

//
// ─── OUTLINE ───────────────────────────────────────────────────────────────────
//

/// A topic together with its tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutline {
    pub topic: Topic,
    pub tasks: Vec<Task>,
}

/// A unit together with its ordered topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutline {
    pub unit: Unit,
    pub topics: Vec<TopicOutline>,
}

/// Read-only snapshot of a course's full unit → topic → task tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub course: Course,
    pub units: Vec<UnitOutline>,
}

impl CourseOutline {
    /// Nest flat rows into an ordered tree.
    ///
    /// Units and topics are ordered by `(position, id)`, tasks by id. Rows
    /// whose parent is not part of this course are dropped.
    #[must_use]
    pub fn assemble(
        course: Course,
        mut units: Vec<Unit>,
        mut topics: Vec<Topic>,
        mut tasks: Vec<Task>,
    ) -> Self {
        units.retain(|u| u.course_id() == course.id());
        units.sort_by_key(|u| (u.position(), u.id()));
        topics.sort_by_key(|t| (t.position(), t.id()));
        tasks.sort_by_key(Task::id);

        let units = units
            .into_iter()
            .map(|unit| {
                let topics = topics
                    .iter()
                    .filter(|t| t.unit_id() == unit.id())
                    .map(|topic| TopicOutline {
                        topic: topic.clone(),
                        tasks: tasks
                            .iter()
                            .filter(|task| task.topic_id() == topic.id())
                            .cloned()
                            .collect(),
                    })
                    .collect();
                UnitOutline { unit, topics }
            })
            .collect();

        Self { course, units }
    }

    /// Total number of tasks across every topic of every unit.
    #[must_use]
    pub fn total_tasks(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.topics)
            .map(|t| t.tasks.len())
            .sum()
    }

    /// Iterates every task id in outline order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.units
            .iter()
            .flat_map(|u| &u.topics)
            .flat_map(|t| &t.tasks)
            .map(Task::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::UserId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn course(id: u64) -> Course {
        Course::new(CourseId::new(id), "C", "", UserId::new(1), date(), date(), true).unwrap()
    }

    fn task(id: u64, topic: u64) -> Task {
        Task::new(TaskId::new(id), TopicId::new(topic), format!("T{id}"), None, date()).unwrap()
    }

    #[test]
    fn blank_names_are_rejected() {
        assert_eq!(
            Unit::new(UnitId::new(1), CourseId::new(1), " ", 1).unwrap_err(),
            HierarchyError::EmptyUnitName
        );
        assert_eq!(
            Topic::new(TopicId::new(1), UnitId::new(1), "", None, 1).unwrap_err(),
            HierarchyError::EmptyTopicName
        );
        assert_eq!(
            Task::new(TaskId::new(1), TopicId::new(1), "\t", None, date()).unwrap_err(),
            HierarchyError::EmptyTaskTitle
        );
    }

    #[test]
    fn details_are_checked_before_any_id_exists() {
        assert_eq!(
            UnitDetails::new("", 0).unwrap_err(),
            HierarchyError::EmptyUnitName
        );
        let details = TaskDetails::new(" Essay ", Some(" ".into()), date()).unwrap();
        let task = Task::from_details(TaskId::new(5), TopicId::new(2), details);
        assert_eq!(task.title(), "Essay");
        assert_eq!(task.description(), None);
    }

    #[test]
    fn blank_descriptions_become_none() {
        let topic =
            Topic::new(TopicId::new(1), UnitId::new(1), "Intro", Some("  ".into()), 1).unwrap();
        assert_eq!(topic.description(), None);
    }

    #[test]
    fn assemble_orders_by_position_then_id() {
        let units = vec![
            Unit::new(UnitId::new(3), CourseId::new(1), "late", 2).unwrap(),
            Unit::new(UnitId::new(2), CourseId::new(1), "tie-b", 1).unwrap(),
            Unit::new(UnitId::new(1), CourseId::new(1), "tie-a", 1).unwrap(),
            Unit::new(UnitId::new(9), CourseId::new(2), "other course", 0).unwrap(),
        ];
        let topics = vec![
            Topic::new(TopicId::new(11), UnitId::new(1), "second", None, 5).unwrap(),
            Topic::new(TopicId::new(10), UnitId::new(1), "first", None, 0).unwrap(),
            Topic::new(TopicId::new(20), UnitId::new(3), "only", None, 0).unwrap(),
        ];
        let tasks = vec![task(102, 10), task(101, 10), task(103, 11), task(201, 20)];

        let outline = CourseOutline::assemble(course(1), units, topics, tasks);

        let unit_ids: Vec<u64> = outline.units.iter().map(|u| u.unit.id().value()).collect();
        assert_eq!(unit_ids, vec![1, 2, 3]);

        let first = &outline.units[0];
        assert_eq!(first.topics[0].topic.name(), "first");
        assert_eq!(first.topics[1].topic.name(), "second");
        assert!(outline.units[1].topics.is_empty());

        let task_ids: Vec<u64> = outline.task_ids().map(|t| t.value()).collect();
        assert_eq!(task_ids, vec![101, 102, 103, 201]);
        assert_eq!(outline.total_tasks(), 4);
    }

    #[test]
    fn empty_course_has_no_tasks() {
        let outline = CourseOutline::assemble(course(1), vec![], vec![], vec![]);
        assert_eq!(outline.total_tasks(), 0);
    }

    #[test]
    fn placement_membership_compares_course_ids() {
        let placement = TaskPlacement {
            task_id: TaskId::new(1),
            topic_id: TopicId::new(1),
            unit_id: UnitId::new(1),
            course_id: CourseId::new(4),
        };
        assert!(placement.belongs_to(CourseId::new(4)));
        assert!(!placement.belongs_to(CourseId::new(5)));
    }
}
