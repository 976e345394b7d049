use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use course_core::{completion_percentage, count_as_u64};
use course_core::model::{
    ApiToken, CompletedTask, CompletedTaskId, Course, CourseDetails, CourseId, CourseOutline,
    Enrollment, EnrollmentId, Role, Task, TaskDetails, TaskId, TaskPlacement, Topic,
    TopicDetails, TopicId, Unit, UnitDetails, UnitId, User, UserId, UserProfile,
};
use course_core::Percentage;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn limit_as_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a user; the id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub api_token: ApiToken,
    pub created_at: DateTime<Utc>,
}

impl NewUserRecord {
    #[must_use]
    pub fn new(
        profile: &UserProfile,
        role: Role,
        api_token: ApiToken,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            username: profile.username().to_owned(),
            full_name: profile.full_name().to_owned(),
            email: profile.email().to_owned(),
            role,
            api_token,
            created_at,
        }
    }

    fn into_user(self, id: UserId) -> Result<User, StorageError> {
        User::new(
            id,
            self.username,
            self.full_name,
            self.email,
            self.role,
            self.created_at,
        )
        .map_err(ser)
    }
}

#[derive(Debug, Clone)]
pub struct NewCourseRecord {
    pub name: String,
    pub description: String,
    pub teacher_id: UserId,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

impl NewCourseRecord {
    #[must_use]
    pub fn new(teacher_id: UserId, details: &CourseDetails) -> Self {
        Self {
            name: details.name().to_owned(),
            description: details.description().to_owned(),
            teacher_id,
            starts_on: details.starts_on(),
            ends_on: details.ends_on(),
            active: details.is_active(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUnitRecord {
    pub course_id: CourseId,
    pub name: String,
    pub position: i32,
}

impl NewUnitRecord {
    #[must_use]
    pub fn new(course_id: CourseId, details: &UnitDetails) -> Self {
        Self {
            course_id,
            name: details.name().to_owned(),
            position: details.position(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTopicRecord {
    pub unit_id: UnitId,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
}

impl NewTopicRecord {
    #[must_use]
    pub fn new(unit_id: UnitId, details: &TopicDetails) -> Self {
        Self {
            unit_id,
            name: details.name().to_owned(),
            description: details.description().map(str::to_owned),
            position: details.position(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTaskRecord {
    pub topic_id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub due_on: NaiveDate,
}

impl NewTaskRecord {
    #[must_use]
    pub fn new(topic_id: TopicId, details: &TaskDetails) -> Self {
        Self {
            topic_id,
            title: details.title().to_owned(),
            description: details.description().map(str::to_owned),
            due_on: details.due_on(),
        }
    }
}

/// Result of recording a completion and recalculating in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRecord {
    /// False when the fact already existed and nothing was inserted.
    pub newly_recorded: bool,
    pub completion: Percentage,
}

/// Result of wiping an enrollment's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRecord {
    pub removed: u64,
    pub completion: Percentage,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_by_token(&self, token: &ApiToken) -> Result<Option<User>, StorageError>;

    /// List users ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StorageError>;

    /// Overwrite username, full name, email and role of an existing user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist and
    /// `StorageError::Conflict` if the new username is taken.
    async fn update_user(&self, user: &User) -> Result<(), StorageError>;

    /// Delete a user. Courses they teach and enrollments they hold go with
    /// them, along with everything below those.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), StorageError>;
}

/// Writes and flat reads over the course hierarchy.
///
/// Deletes cascade downward: course → units → topics → tasks, and a course
/// delete also removes its enrollments and their completion facts.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the teacher does not exist.
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// List courses ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;

    /// Courses taught by `teacher_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn courses_by_teacher(
        &self,
        teacher_id: UserId,
        limit: u32,
    ) -> Result<Vec<Course>, StorageError>;

    /// Overwrite every field of an existing course, including its teacher.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course or teacher does not exist.
    async fn update_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn insert_unit(&self, unit: NewUnitRecord) -> Result<UnitId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, StorageError>;

    /// Overwrite name and position; the parent course is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the unit does not exist.
    async fn update_unit(&self, unit: &Unit) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the unit does not exist.
    async fn delete_unit(&self, id: UnitId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the unit does not exist.
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// Overwrite name, description and position; the parent unit is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn insert_task(&self, task: NewTaskRecord) -> Result<TaskId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StorageError>;

    /// Overwrite title, description and due date; the parent topic is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the task does not exist.
    async fn update_task(&self, task: &Task) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the task does not exist.
    async fn delete_task(&self, id: TaskId) -> Result<(), StorageError>;
}

/// Read-only traversal of the course hierarchy.
#[async_trait]
pub trait HierarchyReader: Send + Sync {
    /// The full ordered tree of a course, or `None` if the course is unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn course_outline(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError>;

    /// Follow Task → Topic → Unit → Course, or `None` if the task is unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn task_placement(&self, id: TaskId) -> Result<Option<TaskPlacement>, StorageError>;

    /// Units of a course ordered by `(position, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn units_of_course(&self, id: CourseId) -> Result<Vec<Unit>, StorageError>;

    /// Topics of a unit ordered by `(position, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn topics_of_unit(&self, id: UnitId) -> Result<Vec<Topic>, StorageError>;

    /// Tasks of a topic ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn tasks_of_topic(&self, id: TopicId) -> Result<Vec<Task>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner or course does not exist.
    async fn insert_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError>;

    /// Zero-or-one lookup; the earliest enrollment wins if duplicates exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn enrollments_for_learner(
        &self,
        learner_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn completed_tasks(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<CompletedTask>, StorageError>;
}

/// Transactional progress writes. Each call re-derives the cached
/// percentage from current hierarchy state before returning.
#[async_trait]
pub trait ProgressPersistence: Send + Sync {
    /// Get-or-create the `(enrollment, task)` fact, then recalculate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment or task does not exist.
    async fn record_completion(
        &self,
        enrollment_id: EnrollmentId,
        task_id: TaskId,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionRecord, StorageError>;

    /// Recompute and persist the cached percentage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn recalculate(&self, enrollment_id: EnrollmentId) -> Result<Percentage, StorageError>;

    /// Delete every completion fact and zero the cached percentage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn reset_progress(&self, enrollment_id: EnrollmentId)
    -> Result<ResetRecord, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    users: BTreeMap<UserId, User>,
    tokens: HashMap<String, UserId>,
    courses: BTreeMap<CourseId, Course>,
    units: BTreeMap<UnitId, Unit>,
    topics: BTreeMap<TopicId, Topic>,
    tasks: BTreeMap<TaskId, Task>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    completed: BTreeMap<CompletedTaskId, CompletedTask>,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn placement(&self, task_id: TaskId) -> Option<TaskPlacement> {
        let task = self.tasks.get(&task_id)?;
        let topic = self.topics.get(&task.topic_id())?;
        let unit = self.units.get(&topic.unit_id())?;
        Some(TaskPlacement {
            task_id,
            topic_id: topic.id(),
            unit_id: unit.id(),
            course_id: unit.course_id(),
        })
    }

    fn recalculate(&mut self, enrollment_id: EnrollmentId) -> Result<Percentage, StorageError> {
        let course_id = self
            .enrollments
            .get(&enrollment_id)
            .ok_or(StorageError::NotFound)?
            .course_id();

        let course_tasks: Vec<TaskId> = self
            .tasks
            .keys()
            .copied()
            .filter(|id| self.placement(*id).is_some_and(|p| p.belongs_to(course_id)))
            .collect();
        let completed = self
            .completed
            .values()
            .filter(|c| c.enrollment_id == enrollment_id && course_tasks.contains(&c.task_id))
            .count();

        let completion =
            completion_percentage(count_as_u64(completed), count_as_u64(course_tasks.len()));
        if let Some(enrollment) = self.enrollments.get_mut(&enrollment_id) {
            enrollment.set_completion(completion);
        }
        Ok(completion)
    }

    fn remove_tasks(&mut self, doomed: &[TaskId]) {
        self.tasks.retain(|id, _| !doomed.contains(id));
        self.completed.retain(|_, c| !doomed.contains(&c.task_id));
    }

    fn remove_topics(&mut self, doomed: &[TopicId]) {
        let tasks: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| doomed.contains(&t.topic_id()))
            .map(Task::id)
            .collect();
        self.remove_tasks(&tasks);
        self.topics.retain(|id, _| !doomed.contains(id));
    }

    fn remove_units(&mut self, doomed: &[UnitId]) {
        let topics: Vec<TopicId> = self
            .topics
            .values()
            .filter(|t| doomed.contains(&t.unit_id()))
            .map(Topic::id)
            .collect();
        self.remove_topics(&topics);
        self.units.retain(|id, _| !doomed.contains(id));
    }

    fn remove_enrollments(&mut self, doomed: &[EnrollmentId]) {
        self.completed
            .retain(|_, c| !doomed.contains(&c.enrollment_id));
        self.enrollments.retain(|id, _| !doomed.contains(id));
    }

    fn remove_courses(&mut self, doomed: &[CourseId]) {
        let units: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| doomed.contains(&u.course_id()))
            .map(Unit::id)
            .collect();
        self.remove_units(&units);
        let enrollments: Vec<EnrollmentId> = self
            .enrollments
            .values()
            .filter(|e| doomed.contains(&e.course_id()))
            .map(Enrollment::id)
            .collect();
        self.remove_enrollments(&enrollments);
        self.courses.retain(|id, _| !doomed.contains(id));
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// One lock guards the whole state, so a completion insert and its
/// recalculation are observed atomically.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self.lock()?;
        if guard.users.values().any(|u| u.username() == user.username) {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(guard.allocate());
        let token = user.api_token.as_str().to_owned();
        let user = user.into_user(id)?;
        guard.users.insert(id, user);
        guard.tokens.insert(token, id);
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .find(|u| u.username() == username)
            .cloned())
    }

    async fn find_by_token(&self, token: &ApiToken) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .tokens
            .get(token.as_str())
            .and_then(|id| guard.users.get(id))
            .cloned())
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.values().take(limit_as_usize(limit)).cloned().collect())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&user.id()) {
            return Err(StorageError::NotFound);
        }
        if guard
            .users
            .values()
            .any(|u| u.id() != user.id() && u.username() == user.username())
        {
            return Err(StorageError::Conflict);
        }
        guard.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.users.remove(&id).ok_or(StorageError::NotFound)?;
        guard.tokens.retain(|_, owner| *owner != id);
        let taught: Vec<CourseId> = guard
            .courses
            .values()
            .filter(|c| c.teacher_id() == id)
            .map(Course::id)
            .collect();
        guard.remove_courses(&taught);
        let held: Vec<EnrollmentId> = guard
            .enrollments
            .values()
            .filter(|e| e.learner_id() == id)
            .map(Enrollment::id)
            .collect();
        guard.remove_enrollments(&held);
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&course.teacher_id) {
            return Err(StorageError::NotFound);
        }
        let id = CourseId::new(guard.allocate());
        let course = Course::new(
            id,
            course.name,
            course.description,
            course.teacher_id,
            course.starts_on,
            course.ends_on,
            course.active,
        )
        .map_err(ser)?;
        guard.courses.insert(id, course);
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.values().take(limit_as_usize(limit)).cloned().collect())
    }

    async fn courses_by_teacher(
        &self,
        teacher_id: UserId,
        limit: u32,
    ) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .courses
            .values()
            .filter(|c| c.teacher_id() == teacher_id)
            .take(limit_as_usize(limit))
            .cloned()
            .collect())
    }

    async fn update_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&course.id())
            || !guard.users.contains_key(&course.teacher_id())
        {
            return Err(StorageError::NotFound);
        }
        guard.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.remove_courses(&[id]);
        Ok(())
    }

    async fn insert_unit(&self, unit: NewUnitRecord) -> Result<UnitId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&unit.course_id) {
            return Err(StorageError::NotFound);
        }
        let id = UnitId::new(guard.allocate());
        let unit = Unit::new(id, unit.course_id, unit.name, unit.position).map_err(ser)?;
        guard.units.insert(id, unit);
        Ok(id)
    }

    async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, StorageError> {
        Ok(self.lock()?.units.get(&id).cloned())
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let existing = guard.units.get_mut(&unit.id()).ok_or(StorageError::NotFound)?;
        *existing =
            Unit::new(unit.id(), existing.course_id(), unit.name(), unit.position()).map_err(ser)?;
        Ok(())
    }

    async fn delete_unit(&self, id: UnitId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.units.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.remove_units(&[id]);
        Ok(())
    }

    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.units.contains_key(&topic.unit_id) {
            return Err(StorageError::NotFound);
        }
        let id = TopicId::new(guard.allocate());
        let topic = Topic::new(id, topic.unit_id, topic.name, topic.description, topic.position)
            .map_err(ser)?;
        guard.topics.insert(id, topic);
        Ok(id)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        Ok(self.lock()?.topics.get(&id).cloned())
    }

    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let existing = guard
            .topics
            .get_mut(&topic.id())
            .ok_or(StorageError::NotFound)?;
        *existing = Topic::new(
            topic.id(),
            existing.unit_id(),
            topic.name(),
            topic.description().map(str::to_owned),
            topic.position(),
        )
        .map_err(ser)?;
        Ok(())
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.remove_topics(&[id]);
        Ok(())
    }

    async fn insert_task(&self, task: NewTaskRecord) -> Result<TaskId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&task.topic_id) {
            return Err(StorageError::NotFound);
        }
        let id = TaskId::new(guard.allocate());
        let task = Task::new(id, task.topic_id, task.title, task.description, task.due_on)
            .map_err(ser)?;
        guard.tasks.insert(id, task);
        Ok(id)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StorageError> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let existing = guard.tasks.get_mut(&task.id()).ok_or(StorageError::NotFound)?;
        *existing = Task::new(
            task.id(),
            existing.topic_id(),
            task.title(),
            task.description().map(str::to_owned),
            task.due_on(),
        )
        .map_err(ser)?;
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.tasks.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.remove_tasks(&[id]);
        Ok(())
    }
}

#[async_trait]
impl HierarchyReader for InMemoryRepository {
    async fn course_outline(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let guard = self.lock()?;
        let Some(course) = guard.courses.get(&id).cloned() else {
            return Ok(None);
        };
        let units: Vec<Unit> = guard
            .units
            .values()
            .filter(|u| u.course_id() == id)
            .cloned()
            .collect();
        let topics: Vec<Topic> = guard
            .topics
            .values()
            .filter(|t| units.iter().any(|u| u.id() == t.unit_id()))
            .cloned()
            .collect();
        let tasks: Vec<Task> = guard
            .tasks
            .values()
            .filter(|t| topics.iter().any(|tp| tp.id() == t.topic_id()))
            .cloned()
            .collect();
        Ok(Some(CourseOutline::assemble(course, units, topics, tasks)))
    }

    async fn task_placement(&self, id: TaskId) -> Result<Option<TaskPlacement>, StorageError> {
        Ok(self.lock()?.placement(id))
    }

    async fn units_of_course(&self, id: CourseId) -> Result<Vec<Unit>, StorageError> {
        let guard = self.lock()?;
        let mut units: Vec<Unit> = guard
            .units
            .values()
            .filter(|u| u.course_id() == id)
            .cloned()
            .collect();
        units.sort_by_key(|u| (u.position(), u.id()));
        Ok(units)
    }

    async fn topics_of_unit(&self, id: UnitId) -> Result<Vec<Topic>, StorageError> {
        let guard = self.lock()?;
        let mut topics: Vec<Topic> = guard
            .topics
            .values()
            .filter(|t| t.unit_id() == id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| (t.position(), t.id()));
        Ok(topics)
    }

    async fn tasks_of_topic(&self, id: TopicId) -> Result<Vec<Task>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .tasks
            .values()
            .filter(|t| t.topic_id() == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&learner_id) || !guard.courses.contains_key(&course_id) {
            return Err(StorageError::NotFound);
        }
        let id = EnrollmentId::new(guard.allocate());
        let enrollment = Enrollment::new(id, learner_id, course_id, enrolled_at);
        guard.enrollments.insert(id, enrollment.clone());
        Ok(enrollment)
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    async fn find_enrollment(
        &self,
        learner_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .enrollments
            .values()
            .find(|e| e.learner_id() == learner_id && e.course_id() == course_id)
            .cloned())
    }

    async fn enrollments_for_learner(
        &self,
        learner_id: UserId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .enrollments
            .values()
            .filter(|e| e.learner_id() == learner_id)
            .cloned()
            .collect())
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.enrollments.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.remove_enrollments(&[id]);
        Ok(())
    }

    async fn completed_tasks(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<CompletedTask>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .completed
            .values()
            .filter(|c| c.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProgressPersistence for InMemoryRepository {
    async fn record_completion(
        &self,
        enrollment_id: EnrollmentId,
        task_id: TaskId,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionRecord, StorageError> {
        let mut guard = self.lock()?;
        if !guard.enrollments.contains_key(&enrollment_id) || !guard.tasks.contains_key(&task_id)
        {
            return Err(StorageError::NotFound);
        }

        let exists = guard
            .completed
            .values()
            .any(|c| c.enrollment_id == enrollment_id && c.task_id == task_id);
        if !exists {
            let id = CompletedTaskId::new(guard.allocate());
            guard.completed.insert(
                id,
                CompletedTask {
                    id,
                    enrollment_id,
                    task_id,
                    completed_at,
                },
            );
        }

        let completion = guard.recalculate(enrollment_id)?;
        Ok(CompletionRecord {
            newly_recorded: !exists,
            completion,
        })
    }

    async fn recalculate(&self, enrollment_id: EnrollmentId) -> Result<Percentage, StorageError> {
        self.lock()?.recalculate(enrollment_id)
    }

    async fn reset_progress(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<ResetRecord, StorageError> {
        let mut guard = self.lock()?;
        let enrollment = guard
            .enrollments
            .get_mut(&enrollment_id)
            .ok_or(StorageError::NotFound)?;
        enrollment.set_completion(Percentage::ZERO);

        let before = guard.completed.len();
        guard
            .completed
            .retain(|_, c| c.enrollment_id != enrollment_id);
        let removed = count_as_u64(before - guard.completed.len());

        Ok(ResetRecord {
            removed,
            completion: Percentage::ZERO,
        })
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub hierarchy: Arc<dyn HierarchyReader>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn ProgressPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every contract to one repository value.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + CourseRepository
            + HierarchyReader
            + EnrollmentRepository
            + ProgressPersistence
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            courses: Arc::new(repo.clone()),
            hierarchy: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}
