use chrono::NaiveDate;
use course_core::Percentage;
use course_core::model::{Role, User};
use course_core::time::fixed_now;
use services::{
    AppServices, Clock, CourseDraft, ProgressError, SectionDraft, UserDraft, ensure_default_users,
};
use storage::repository::Storage;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

fn section(name: &str, position: i32) -> SectionDraft {
    SectionDraft {
        name: name.to_string(),
        description: None,
        position,
    }
}

async fn teacher_and_student(app: &AppServices) -> (User, User) {
    ensure_default_users(&app.users()).await.expect("seed");
    let users = app.users();
    let teacher = users
        .find_by_username("teacher")
        .await
        .unwrap()
        .expect("seeded teacher");
    let student = users
        .register_student(UserDraft {
            username: "learner".to_string(),
            full_name: "A Learner".to_string(),
            email: "learner@example.com".to_string(),
        })
        .await
        .expect("register")
        .user;
    assert_eq!(teacher.role(), Role::Teacher);
    (teacher, student)
}

async fn run_scenario(app: AppServices) {
    let (teacher, student) = teacher_and_student(&app).await;
    let courses = app.courses();

    let course = courses
        .create_course(
            &teacher,
            CourseDraft {
                name: "Intro to Rust".to_string(),
                description: "Ownership and borrowing".to_string(),
                teacher_id: None,
                starts_on: day(),
                ends_on: day(),
                active: true,
            },
        )
        .await
        .expect("create course");
    let unit = courses
        .create_unit(&teacher, course.id(), section("Basics", 1))
        .await
        .unwrap();
    let topic = courses
        .create_topic(&teacher, unit.id(), section("Ownership", 1))
        .await
        .unwrap();
    let mut tasks = Vec::new();
    for n in 1..=4 {
        tasks.push(
            courses
                .create_task(&teacher, topic.id(), section(&format!("Exercise {n}"), 0), day())
                .await
                .unwrap()
                .id(),
        );
    }

    let progress = app.progress();
    let enrollment = app
        .enrollments()
        .enroll(student.id(), course.id())
        .await
        .unwrap()
        .enrollment;

    let first = progress
        .mark_task_completed(student.id(), course.id(), tasks[0])
        .await
        .unwrap();
    assert!(first.newly_completed);
    assert_eq!(first.percentage.to_string(), "25.00");

    let repeat = progress
        .mark_task_completed(student.id(), course.id(), tasks[0])
        .await
        .unwrap();
    assert!(!repeat.newly_completed);
    assert_eq!(repeat.percentage.to_string(), "25.00");

    let report = progress.task_status(student.id(), course.id()).await.unwrap();
    assert_eq!(report.completed_tasks, 1);

    let second = progress
        .mark_task_completed(student.id(), course.id(), tasks[1])
        .await
        .unwrap();
    assert_eq!(second.percentage.to_string(), "50.00");

    let reset = progress
        .reset_progress(enrollment.id(), &student)
        .await
        .unwrap();
    assert_eq!(reset.percentage, Percentage::ZERO);
    assert_eq!(reset.removed, 2);

    let report = progress.task_status(student.id(), course.id()).await.unwrap();
    assert_eq!(report.completed_tasks, 0);
    assert!(report.percentage.is_zero());
}

#[tokio::test]
async fn scenario_on_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_flow?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    run_scenario(AppServices::from_storage(&storage, Clock::fixed(fixed_now()))).await;
}

#[tokio::test]
async fn scenario_in_memory() {
    run_scenario(AppServices::in_memory(Clock::fixed(fixed_now()))).await;
}

#[tokio::test]
async fn task_from_another_course_is_rejected_without_a_fact() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let (teacher, student) = teacher_and_student(&app).await;
    let courses = app.courses();

    let mut task_ids = Vec::new();
    let mut course_ids = Vec::new();
    for name in ["Course A", "Course B"] {
        let course = courses
            .create_course(
                &teacher,
                CourseDraft {
                    name: name.to_string(),
                    description: String::new(),
                    teacher_id: None,
                    starts_on: day(),
                    ends_on: day(),
                    active: true,
                },
            )
            .await
            .unwrap();
        let unit = courses
            .create_unit(&teacher, course.id(), section("U", 0))
            .await
            .unwrap();
        let topic = courses
            .create_topic(&teacher, unit.id(), section("T", 0))
            .await
            .unwrap();
        let task = courses
            .create_task(&teacher, topic.id(), section("Only task", 0), day())
            .await
            .unwrap();
        course_ids.push(course.id());
        task_ids.push(task.id());
    }

    app.enrollments()
        .enroll(student.id(), course_ids[0])
        .await
        .unwrap();
    let err = app
        .progress()
        .mark_task_completed(student.id(), course_ids[0], task_ids[1])
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::TaskCourseMismatch { .. }));

    let report = app
        .progress()
        .task_status(student.id(), course_ids[0])
        .await
        .unwrap();
    assert_eq!(report.completed_tasks, 0);
    assert!(report.percentage.is_zero());
}

#[tokio::test]
async fn other_learners_cannot_reset_my_progress() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let (teacher, student) = teacher_and_student(&app).await;
    let course = app
        .courses()
        .create_course(
            &teacher,
            CourseDraft {
                name: "Private".to_string(),
                description: String::new(),
                teacher_id: None,
                starts_on: day(),
                ends_on: day(),
                active: true,
            },
        )
        .await
        .unwrap();
    let enrollment = app
        .enrollments()
        .enroll(student.id(), course.id())
        .await
        .unwrap()
        .enrollment;

    let err = app
        .progress()
        .reset_progress(enrollment.id(), &teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::Forbidden));
}

async fn hierarchy_edits_then_recalculate(app: AppServices) {
    let (teacher, student) = teacher_and_student(&app).await;
    let courses = app.courses();
    let progress = app.progress();

    let course = courses
        .create_course(
            &teacher,
            CourseDraft {
                name: "Shifting ground".to_string(),
                description: String::new(),
                teacher_id: None,
                starts_on: day(),
                ends_on: day(),
                active: true,
            },
        )
        .await
        .unwrap();
    let unit = courses
        .create_unit(&teacher, course.id(), section("U", 0))
        .await
        .unwrap();
    let topic = courses
        .create_topic(&teacher, unit.id(), section("T", 0))
        .await
        .unwrap();
    let mut tasks = Vec::new();
    for n in 1..=4 {
        tasks.push(
            courses
                .create_task(&teacher, topic.id(), section(&format!("Step {n}"), 0), day())
                .await
                .unwrap()
                .id(),
        );
    }

    let enrollment = app
        .enrollments()
        .enroll(student.id(), course.id())
        .await
        .unwrap()
        .enrollment;
    progress
        .mark_task_completed(student.id(), course.id(), tasks[0])
        .await
        .unwrap();

    // a fifth task leaves the cache stale until recalculation
    courses
        .create_task(&teacher, topic.id(), section("Step 5", 0), day())
        .await
        .unwrap();
    let cached = app.enrollments().enrollments_of(student.id()).await.unwrap();
    assert_eq!(cached[0].completion().to_string(), "25.00");
    let fixed = progress.recalculate(enrollment.id(), &student).await.unwrap();
    assert_eq!(fixed.percentage.to_string(), "20.00");

    courses.delete_task(&teacher, tasks[1]).await.unwrap();
    let fixed = progress.recalculate(enrollment.id(), &student).await.unwrap();
    assert_eq!(fixed.percentage.to_string(), "25.00");

    // renaming a completed task keeps its completion
    courses
        .update_task(&teacher, tasks[0], section("Step one, revised", 0), day())
        .await
        .unwrap();
    let fixed = progress.recalculate(enrollment.id(), &student).await.unwrap();
    assert_eq!(fixed.percentage.to_string(), "25.00");

    courses.delete_task(&teacher, tasks[0]).await.unwrap();
    let fixed = progress.recalculate(enrollment.id(), &student).await.unwrap();
    assert_eq!(fixed.percentage, Percentage::ZERO);
    let report = progress.task_status(student.id(), course.id()).await.unwrap();
    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.completed_tasks, 0);

    // deleting the learner takes their enrollment with them
    let admin = app
        .users()
        .find_by_username("admin")
        .await
        .unwrap()
        .expect("seeded admin");
    app.users().delete_user(&admin, student.id()).await.unwrap();
    assert!(app
        .enrollments()
        .enrollments_of(student.id())
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        progress.task_status(student.id(), course.id()).await,
        Err(ProgressError::NotEnrolled { .. })
    ));
}

#[tokio::test]
async fn recalculation_follows_hierarchy_edits_in_memory() {
    hierarchy_edits_then_recalculate(AppServices::in_memory(Clock::fixed(fixed_now()))).await;
}

#[tokio::test]
async fn recalculation_follows_hierarchy_edits_on_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_hierarchy_edits?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    hierarchy_edits_then_recalculate(AppServices::from_storage(&storage, Clock::fixed(fixed_now())))
        .await;
}
