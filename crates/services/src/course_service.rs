use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use course_core::model::{
    Course, CourseDetails, CourseId, CourseOutline, Task, TaskDetails, TaskId, Topic,
    TopicDetails, TopicId, Unit, UnitDetails, UnitId, User, UserId,
};
use storage::repository::{
    CourseRepository, HierarchyReader, NewCourseRecord, NewTaskRecord, NewTopicRecord,
    NewUnitRecord, UserRepository,
};

use crate::error::CourseServiceError;

/// Input for creating a course.
#[derive(Debug, Clone)]
pub struct CourseDraft {
    pub name: String,
    pub description: String,
    /// Only administrators may name a teacher other than themselves.
    pub teacher_id: Option<UserId>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

/// Input for creating a unit, topic or task. `position` is ignored for tasks.
#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
}

/// Manages the course → unit → topic → task hierarchy.
///
/// Writes are allowed for administrators and for the teacher who owns the
/// course.
#[derive(Clone)]
pub struct CourseService {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    hierarchy: Arc<dyn HierarchyReader>,
}

impl CourseService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        hierarchy: Arc<dyn HierarchyReader>,
    ) -> Self {
        Self {
            users,
            courses,
            hierarchy,
        }
    }

    async fn owned_course(
        &self,
        actor: &User,
        course_id: CourseId,
    ) -> Result<Course, CourseServiceError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        if actor.is_admin() || course.teacher_id() == actor.id() {
            Ok(course)
        } else {
            warn!(course_id = %course_id, user_id = %actor.id(), "rejected course modification");
            Err(CourseServiceError::Forbidden)
        }
    }

    async fn owning_course_of_unit(
        &self,
        actor: &User,
        unit_id: UnitId,
    ) -> Result<Course, CourseServiceError> {
        let unit = self
            .courses
            .get_unit(unit_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owned_course(actor, unit.course_id()).await
    }

    async fn owning_course_of_topic(
        &self,
        actor: &User,
        topic_id: TopicId,
    ) -> Result<Course, CourseServiceError> {
        let topic = self
            .courses
            .get_topic(topic_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owning_course_of_unit(actor, topic.unit_id()).await
    }

    /// Resolve the teacher of a course being written. `fallback` is used when
    /// no other teacher is named.
    async fn resolve_teacher(
        &self,
        actor: &User,
        requested: Option<UserId>,
        fallback: UserId,
    ) -> Result<UserId, CourseServiceError> {
        match requested {
            Some(id) if id != fallback => {
                if !actor.is_admin() {
                    return Err(CourseServiceError::Forbidden);
                }
                let teacher = self
                    .users
                    .get_user(id)
                    .await?
                    .ok_or(CourseServiceError::NotFound)?;
                if !teacher.role().can_author_courses() {
                    return Err(CourseServiceError::InvalidTeacher(id));
                }
                Ok(id)
            }
            _ => Ok(fallback),
        }
    }

    /// Create a course taught by `actor`, or by `draft.teacher_id` when
    /// `actor` is an administrator.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Forbidden` if `actor` cannot author
    /// courses or names another teacher without being an administrator,
    /// `CourseServiceError::InvalidTeacher` if the named user is not a teacher
    /// or administrator, and `CourseServiceError::Invalid` for validation
    /// failures.
    pub async fn create_course(
        &self,
        actor: &User,
        draft: CourseDraft,
    ) -> Result<Course, CourseServiceError> {
        if !actor.role().can_author_courses() {
            return Err(CourseServiceError::Forbidden);
        }

        let details = CourseDetails::new(
            draft.name,
            draft.description,
            draft.starts_on,
            draft.ends_on,
            draft.active,
        )?;
        let teacher_id = self
            .resolve_teacher(actor, draft.teacher_id, actor.id())
            .await?;
        let id = self
            .courses
            .insert_course(NewCourseRecord::new(teacher_id, &details))
            .await?;
        info!(course_id = %id, teacher_id = %teacher_id, "course created");

        Ok(Course::from_details(id, teacher_id, details))
    }

    /// Replace the fields of a course. Only administrators may hand the
    /// course to another teacher; `draft.teacher_id = None` keeps the current
    /// one.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound`, `CourseServiceError::Forbidden`,
    /// `CourseServiceError::InvalidTeacher` or `CourseServiceError::Invalid`
    /// under the same rules as [`CourseService::create_course`].
    pub async fn update_course(
        &self,
        actor: &User,
        course_id: CourseId,
        draft: CourseDraft,
    ) -> Result<Course, CourseServiceError> {
        let current = self.owned_course(actor, course_id).await?;
        let details = CourseDetails::new(
            draft.name,
            draft.description,
            draft.starts_on,
            draft.ends_on,
            draft.active,
        )?;
        let teacher_id = self
            .resolve_teacher(actor, draft.teacher_id, current.teacher_id())
            .await?;

        let course = Course::from_details(course_id, teacher_id, details);
        self.courses.update_course(&course).await?;
        info!(course_id = %course_id, teacher_id = %teacher_id, "course updated");
        Ok(course)
    }

    /// List courses ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.courses.list_courses(limit).await?)
    }

    /// List the courses taught by `teacher_id`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn courses_by_teacher(
        &self,
        teacher_id: UserId,
        limit: u32,
    ) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.courses.courses_by_teacher(teacher_id, limit).await?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the course does not exist.
    pub async fn units_of(&self, course_id: CourseId) -> Result<Vec<Unit>, CourseServiceError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(CourseServiceError::NotFound);
        }
        Ok(self.hierarchy.units_of_course(course_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the unit does not exist.
    pub async fn topics_of(&self, unit_id: UnitId) -> Result<Vec<Topic>, CourseServiceError> {
        if self.courses.get_unit(unit_id).await?.is_none() {
            return Err(CourseServiceError::NotFound);
        }
        Ok(self.hierarchy.topics_of_unit(unit_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the topic does not exist.
    pub async fn tasks_of(&self, topic_id: TopicId) -> Result<Vec<Task>, CourseServiceError> {
        if self.courses.get_topic(topic_id).await?.is_none() {
            return Err(CourseServiceError::NotFound);
        }
        Ok(self.hierarchy.tasks_of_topic(topic_id).await?)
    }

    /// Fetch the full ordered tree of a course.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the course does not exist.
    pub async fn outline(&self, course_id: CourseId) -> Result<CourseOutline, CourseServiceError> {
        self.hierarchy
            .course_outline(course_id)
            .await?
            .ok_or(CourseServiceError::NotFound)
    }

    /// Delete a course with everything below it, including enrollments.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` or `CourseServiceError::Forbidden`.
    pub async fn delete_course(
        &self,
        actor: &User,
        course_id: CourseId,
    ) -> Result<(), CourseServiceError> {
        self.owned_course(actor, course_id).await?;
        self.courses.delete_course(course_id).await?;
        info!(course_id = %course_id, "course deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for a missing course,
    /// `CourseServiceError::Forbidden` for non-owners and
    /// `CourseServiceError::Invalid` for a blank name.
    pub async fn create_unit(
        &self,
        actor: &User,
        course_id: CourseId,
        draft: SectionDraft,
    ) -> Result<Unit, CourseServiceError> {
        self.owned_course(actor, course_id).await?;
        let details = UnitDetails::new(draft.name, draft.position)?;
        let id = self
            .courses
            .insert_unit(NewUnitRecord::new(course_id, &details))
            .await?;
        Ok(Unit::from_details(id, course_id, details))
    }

    /// Rename or reposition a unit within its course.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound`, `CourseServiceError::Forbidden`
    /// or `CourseServiceError::Invalid`.
    pub async fn update_unit(
        &self,
        actor: &User,
        unit_id: UnitId,
        draft: SectionDraft,
    ) -> Result<Unit, CourseServiceError> {
        let course = self.owning_course_of_unit(actor, unit_id).await?;
        let details = UnitDetails::new(draft.name, draft.position)?;
        let unit = Unit::from_details(unit_id, course.id(), details);
        self.courses.update_unit(&unit).await?;
        info!(unit_id = %unit_id, "unit updated");
        Ok(unit)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for a missing unit,
    /// `CourseServiceError::Forbidden` for non-owners and
    /// `CourseServiceError::Invalid` for a blank name.
    pub async fn create_topic(
        &self,
        actor: &User,
        unit_id: UnitId,
        draft: SectionDraft,
    ) -> Result<Topic, CourseServiceError> {
        self.owning_course_of_unit(actor, unit_id).await?;
        let details = TopicDetails::new(draft.name, draft.description, draft.position)?;
        let id = self
            .courses
            .insert_topic(NewTopicRecord::new(unit_id, &details))
            .await?;
        Ok(Topic::from_details(id, unit_id, details))
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound`, `CourseServiceError::Forbidden`
    /// or `CourseServiceError::Invalid`.
    pub async fn update_topic(
        &self,
        actor: &User,
        topic_id: TopicId,
        draft: SectionDraft,
    ) -> Result<Topic, CourseServiceError> {
        let current = self
            .courses
            .get_topic(topic_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owning_course_of_unit(actor, current.unit_id()).await?;
        let details = TopicDetails::new(draft.name, draft.description, draft.position)?;
        let topic = Topic::from_details(topic_id, current.unit_id(), details);
        self.courses.update_topic(&topic).await?;
        info!(topic_id = %topic_id, "topic updated");
        Ok(topic)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for a missing topic,
    /// `CourseServiceError::Forbidden` for non-owners and
    /// `CourseServiceError::Invalid` for a blank title.
    pub async fn create_task(
        &self,
        actor: &User,
        topic_id: TopicId,
        draft: SectionDraft,
        due_on: NaiveDate,
    ) -> Result<Task, CourseServiceError> {
        self.owning_course_of_topic(actor, topic_id).await?;
        let details = TaskDetails::new(draft.name, draft.description, due_on)?;
        let id = self
            .courses
            .insert_task(NewTaskRecord::new(topic_id, &details))
            .await?;
        Ok(Task::from_details(id, topic_id, details))
    }

    /// Rewrite a task's title, description and due date. Completion facts
    /// for the task are kept.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound`, `CourseServiceError::Forbidden`
    /// or `CourseServiceError::Invalid`.
    pub async fn update_task(
        &self,
        actor: &User,
        task_id: TaskId,
        draft: SectionDraft,
        due_on: NaiveDate,
    ) -> Result<Task, CourseServiceError> {
        let current = self
            .courses
            .get_task(task_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owning_course_of_topic(actor, current.topic_id()).await?;
        let details = TaskDetails::new(draft.name, draft.description, due_on)?;
        let task = Task::from_details(task_id, current.topic_id(), details);
        self.courses.update_task(&task).await?;
        info!(task_id = %task_id, "task updated");
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` or `CourseServiceError::Forbidden`.
    pub async fn delete_unit(&self, actor: &User, unit_id: UnitId) -> Result<(), CourseServiceError> {
        self.owning_course_of_unit(actor, unit_id).await?;
        self.courses.delete_unit(unit_id).await?;
        info!(unit_id = %unit_id, "unit deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` or `CourseServiceError::Forbidden`.
    pub async fn delete_topic(
        &self,
        actor: &User,
        topic_id: TopicId,
    ) -> Result<(), CourseServiceError> {
        self.owning_course_of_topic(actor, topic_id).await?;
        self.courses.delete_topic(topic_id).await?;
        info!(topic_id = %topic_id, "topic deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` or `CourseServiceError::Forbidden`.
    pub async fn delete_task(&self, actor: &User, task_id: TaskId) -> Result<(), CourseServiceError> {
        let placement = self
            .hierarchy
            .task_placement(task_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owned_course(actor, placement.course_id).await?;
        self.courses.delete_task(task_id).await?;
        info!(task_id = %task_id, "task deleted");
        Ok(())
    }
}
