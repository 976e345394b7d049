//! Completion percentages and the per-enrollment status projection.
//!
//! Percentages are kept as integer hundredths so that `25.00` is stored and
//! compared exactly. Rounding from a `completed / total` ratio is
//! round-half-even on the exact rational value.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::model::{
    CourseId, CourseOutline, Enrollment, EnrollmentId, TaskId, TopicId, TopicOutline, UnitId,
};

const HUNDREDTHS_PER_WHOLE: u64 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PercentageError {
    #[error("percentage out of range: {0} hundredths (max 10000)")]
    OutOfRange(i64),
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// A percentage in `[0.00, 100.00]` with two-decimal precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(u16);

impl Percentage {
    pub const ZERO: Self = Self(0);
    #[allow(clippy::cast_possible_truncation)]
    pub const FULL: Self = Self(HUNDREDTHS_PER_WHOLE as u16);

    /// # Errors
    ///
    /// Returns `PercentageError::OutOfRange` outside `0..=10000`.
    pub fn from_hundredths(value: i64) -> Result<Self, PercentageError> {
        u16::try_from(value)
            .ok()
            .filter(|v| u64::from(*v) <= HUNDREDTHS_PER_WHOLE)
            .map(Self)
            .ok_or(PercentageError::OutOfRange(value))
    }

    #[must_use]
    pub fn hundredths(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

//
// ─── RECALCULATION ─────────────────────────────────────────────────────────────
//

/// Derive a completion percentage from task counts.
///
/// `total == 0` yields `0.00`. `completed` above `total` is clamped, so the
/// result never exceeds `100.00`.
#[must_use]
pub fn completion_percentage(completed: u64, total: u64) -> Percentage {
    if total == 0 {
        return Percentage::ZERO;
    }
    let completed = completed.min(total);
    let numerator = u128::from(completed) * u128::from(HUNDREDTHS_PER_WHOLE);
    let denominator = u128::from(total);

    let mut quotient = numerator / denominator;
    let twice_remainder = (numerator % denominator) * 2;
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient += 1;
    }

    // quotient <= 10_000 because completed <= total
    #[allow(clippy::cast_possible_truncation)]
    Percentage(quotient as u16)
}

//
// ─── STATUS PROJECTION ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub due_on: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStatus {
    pub id: TopicId,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub percentage: Percentage,
    pub tasks: Vec<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStatus {
    pub id: UnitId,
    pub name: String,
    pub position: i32,
    pub percentage: Percentage,
    pub topics: Vec<TopicStatus>,
}

/// The course tree annotated with what one learner has completed.
///
/// `percentage` is the enrollment's cached value, not recomputed here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_name: String,
    pub percentage: Percentage,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub units: Vec<UnitStatus>,
}

/// Widen a collection length for percentage math, saturating on overflow.
#[must_use]
pub fn count_as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn topic_status(outline: &TopicOutline, completed: &HashSet<TaskId>) -> TopicStatus {
    let tasks: Vec<TaskStatus> = outline
        .tasks
        .iter()
        .map(|task| TaskStatus {
            id: task.id(),
            title: task.title().to_owned(),
            description: task.description().map(str::to_owned),
            due_on: task.due_on(),
            completed: completed.contains(&task.id()),
        })
        .collect();
    let done = tasks.iter().filter(|t| t.completed).count();

    TopicStatus {
        id: outline.topic.id(),
        name: outline.topic.name().to_owned(),
        description: outline.topic.description().map(str::to_owned),
        position: outline.topic.position(),
        percentage: completion_percentage(count_as_u64(done), count_as_u64(tasks.len())),
        tasks,
    }
}

impl ProgressReport {
    /// Project the outline for `enrollment`, flagging every task found in `completed`.
    #[must_use]
    pub fn project(
        enrollment: &Enrollment,
        outline: &CourseOutline,
        completed: &HashSet<TaskId>,
    ) -> Self {
        let units: Vec<UnitStatus> = outline
            .units
            .iter()
            .map(|unit| {
                let topics: Vec<TopicStatus> = unit
                    .topics
                    .iter()
                    .map(|t| topic_status(t, completed))
                    .collect();
                let total: usize = topics.iter().map(|t| t.tasks.len()).sum();
                let done = topics
                    .iter()
                    .flat_map(|t| &t.tasks)
                    .filter(|t| t.completed)
                    .count();
                UnitStatus {
                    id: unit.unit.id(),
                    name: unit.unit.name().to_owned(),
                    position: unit.unit.position(),
                    percentage: completion_percentage(count_as_u64(done), count_as_u64(total)),
                    topics,
                }
            })
            .collect();

        let completed_tasks = outline
            .task_ids()
            .filter(|id| completed.contains(id))
            .count();

        Self {
            enrollment_id: enrollment.id(),
            course_id: outline.course.id(),
            course_name: outline.course.name().to_owned(),
            percentage: enrollment.completion(),
            completed_tasks,
            total_tasks: outline.total_tasks(),
            units,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
