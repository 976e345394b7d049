use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use course_core::time::fixed_clock;
use services::AppServices;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Tokens {
    admin: String,
    teacher: String,
    student: String,
}

/// In-memory router with the default accounts seeded.
async fn seeded_app() -> (Router, Tokens) {
    let services = AppServices::in_memory(fixed_clock());
    let seeded = app::seed(&services).await.unwrap();
    let token_of = |name: &str| {
        seeded
            .iter()
            .find(|s| s.username == name)
            .and_then(|s| s.token.as_ref())
            .map(|t| t.as_str().to_owned())
            .unwrap()
    };
    let tokens = Tokens {
        admin: token_of("admin"),
        teacher: token_of("teacher"),
        student: token_of("student"),
    };
    (app::build_router(services), tokens)
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, Some(token), None).await
}

async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(token), Some(body)).await
}

async fn put_json(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, Some(token), Some(body)).await
}

/// Create a course with one unit, one topic and `tasks` tasks. Returns the
/// course id and the task ids.
async fn build_course(app: &Router, teacher: &str, name: &str, tasks: usize) -> (u64, Vec<u64>) {
    let (status, course) = post_json(
        app,
        "/api/courses",
        teacher,
        json!({
            "name": name,
            "description": "intro",
            "starts_on": "2024-01-01",
            "ends_on": "2024-06-30"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{course}");
    let course_id = course["id"].as_u64().unwrap();

    let (status, unit) = post_json(
        app,
        &format!("/api/courses/{course_id}/units"),
        teacher,
        json!({ "name": "Unit 1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{unit}");
    let unit_id = unit["id"].as_u64().unwrap();

    let (status, topic) = post_json(
        app,
        &format!("/api/units/{unit_id}/topics"),
        teacher,
        json!({ "name": "Topic 1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{topic}");
    let topic_id = topic["id"].as_u64().unwrap();

    let mut task_ids = Vec::new();
    for i in 0..tasks {
        let (status, task) = post_json(
            app,
            &format!("/api/topics/{topic_id}/tasks"),
            teacher,
            json!({ "title": format!("Task {i}"), "due_on": "2024-02-01" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{task}");
        task_ids.push(task["id"].as_u64().unwrap());
    }
    (course_id, task_ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = seeded_app().await;
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
    let (app, _) = seeded_app().await;

    let (status, body) = send(&app, "GET", "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = get(&app, "/api/me", "not-a-real-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_returns_a_usable_token() {
    let (app, _) = seeded_app().await;
    let (status, issued) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": "kim",
            "full_name": "Kim Lee",
            "email": "kim@example.org"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    assert_eq!(issued["user"]["role"], "student");

    let token = issued["token"].as_str().unwrap();
    let (status, me) = get(&app, "/api/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "kim");

    let (status, body) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": "kim",
            "full_name": "Other Kim",
            "email": "other@example.org"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn only_admins_manage_users() {
    let (app, tokens) = seeded_app().await;
    let new_teacher = json!({
        "username": "t2",
        "full_name": "Second Teacher",
        "email": "t2@example.org",
        "role": "teacher"
    });

    let (status, body) = post_json(&app, "/api/users", &tokens.student, new_teacher.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, issued) = post_json(&app, "/api/users", &tokens.admin, new_teacher).await;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    assert_eq!(issued["user"]["role"], "teacher");

    let (status, users) = get(&app, "/api/users?limit=10", &tokens.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn completion_flow_tracks_percentage_and_resets() {
    let (app, tokens) = seeded_app().await;
    let (course_id, tasks) = build_course(&app, &tokens.teacher, "Algebra", 4).await;

    let (status, outline) = get(&app, &format!("/api/courses/{course_id}"), &tokens.student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outline["total_tasks"], 4);
    assert_eq!(outline["units"][0]["topics"][0]["tasks"].as_array().unwrap().len(), 4);

    let (status, enrollment) = post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{enrollment}");
    let enrollment_id = enrollment["id"].as_u64().unwrap();
    assert_eq!(enrollment["percentage"], 0.0);

    let (status, again) = post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"].as_u64(), Some(enrollment_id));

    let complete = |task: u64| json!({ "course_id": course_id, "task_id": task });

    let (status, first) =
        post_json(&app, "/api/progress/complete", &tokens.student, complete(tasks[0])).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["percentage"], 25.0);
    assert_eq!(first["newly_completed"], true);
    assert_eq!(first["enrollment_id"].as_u64(), Some(enrollment_id));

    let (_, repeat) =
        post_json(&app, "/api/progress/complete", &tokens.student, complete(tasks[0])).await;
    assert_eq!(repeat["percentage"], 25.0);
    assert_eq!(repeat["newly_completed"], false);

    let (_, second) =
        post_json(&app, "/api/progress/complete", &tokens.student, complete(tasks[1])).await;
    assert_eq!(second["percentage"], 50.0);

    let (status, report) = get(
        &app,
        &format!("/api/progress/courses/{course_id}"),
        &tokens.student,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["completed_tasks"], 2);
    assert_eq!(report["total_tasks"], 4);
    assert_eq!(report["units"][0]["topics"][0]["tasks"][0]["completed"], true);
    assert_eq!(report["units"][0]["topics"][0]["tasks"][3]["completed"], false);

    let (status, reset) = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/reset"),
        &tokens.student,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reset}");
    assert_eq!(reset["percentage"], 0.0);
    assert_eq!(reset["removed"], 2);

    let (_, recalculated) = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/recalculate"),
        &tokens.admin,
        json!({}),
    )
    .await;
    assert_eq!(recalculated["percentage"], 0.0);
}

#[tokio::test]
async fn completing_without_enrollment_is_not_enrolled() {
    let (app, tokens) = seeded_app().await;
    let (course_id, tasks) = build_course(&app, &tokens.teacher, "History", 1).await;

    let (status, body) = post_json(
        &app,
        "/api/progress/complete",
        &tokens.student,
        json!({ "course_id": course_id, "task_id": tasks[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_enrolled");
}

#[tokio::test]
async fn task_from_another_course_is_rejected() {
    let (app, tokens) = seeded_app().await;
    let (course_a, _) = build_course(&app, &tokens.teacher, "Biology", 2).await;
    let (_, tasks_b) = build_course(&app, &tokens.teacher, "Chemistry", 2).await;

    let (status, _) = post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_a }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(
        &app,
        "/api/progress/complete",
        &tokens.student,
        json!({ "course_id": course_a, "task_id": tasks_b[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "task_course_mismatch");

    let (_, report) = get(
        &app,
        &format!("/api/progress/courses/{course_a}"),
        &tokens.student,
    )
    .await;
    assert_eq!(report["completed_tasks"], 0);
}

#[tokio::test]
async fn students_cannot_author_or_reset_others() {
    let (app, tokens) = seeded_app().await;

    let (status, body) = post_json(
        &app,
        "/api/courses",
        &tokens.student,
        json!({ "name": "Mine", "starts_on": "2024-01-01", "ends_on": "2024-02-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (course_id, _) = build_course(&app, &tokens.teacher, "Physics", 1).await;
    let (_, enrollment) = post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_id }),
    )
    .await;
    let enrollment_id = enrollment["id"].as_u64().unwrap();

    let (status, body) = post_json(
        &app,
        &format!("/api/enrollments/{enrollment_id}/reset"),
        &tokens.teacher,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn invalid_course_dates_are_rejected() {
    let (app, tokens) = seeded_app().await;
    let (status, body) = post_json(
        &app,
        "/api/courses",
        &tokens.teacher,
        json!({ "name": "Backwards", "starts_on": "2024-06-01", "ends_on": "2024-01-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn deleting_a_course_cascades_and_withdraw_removes_enrollment() {
    let (app, tokens) = seeded_app().await;
    let (course_id, _) = build_course(&app, &tokens.teacher, "Art", 2).await;
    let (_, enrollment) = post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_id }),
    )
    .await;
    let enrollment_id = enrollment["id"].as_u64().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/enrollments/{enrollment_id}"),
        Some(&tokens.student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, mine) = get(&app, "/api/enrollments", &tokens.student).await;
    assert!(mine.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/courses/{course_id}"),
        Some(&tokens.teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = get(&app, &format!("/api/courses/{course_id}"), &tokens.teacher).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn malformed_input_is_invalid_input() {
    let (app, tokens) = seeded_app().await;

    let (status, body) = post_json(
        &app,
        "/api/progress/complete",
        &tokens.student,
        json!({ "course_id": "abc", "task_id": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
    assert!(body["error"].is_string());

    let (status, body) = get(&app, "/api/progress/courses/not-a-number", &tokens.student).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, body) = get(&app, "/api/courses?limit=lots", &tokens.student).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, body) = post_json(
        &app,
        "/api/courses",
        &tokens.teacher,
        json!({ "name": "No dates" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn owner_edits_course_and_sections() {
    let (app, tokens) = seeded_app().await;
    let (course_id, task_ids) = build_course(&app, &tokens.teacher, "Chemistry", 2).await;
    let (_, teacher) = get(&app, "/api/me", &tokens.teacher).await;
    let teacher_id = teacher["id"].as_u64().unwrap();

    let edit = json!({
        "name": "Organic chemistry",
        "starts_on": "2024-01-01",
        "ends_on": "2024-12-31",
        "active": false
    });
    let (status, body) = put_json(
        &app,
        &format!("/api/courses/{course_id}"),
        &tokens.student,
        edit.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, course) =
        put_json(&app, &format!("/api/courses/{course_id}"), &tokens.teacher, edit).await;
    assert_eq!(status, StatusCode::OK, "{course}");
    assert_eq!(course["name"], "Organic chemistry");
    assert_eq!(course["active"], false);
    assert_eq!(course["teacher_id"], teacher_id);

    let (status, mine) = get(
        &app,
        &format!("/api/courses?teacher_id={teacher_id}"),
        &tokens.student,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, units) = get(&app, &format!("/api/courses/{course_id}/units"), &tokens.student).await;
    let unit_id = units[0]["id"].as_u64().unwrap();
    let (status, unit) = put_json(
        &app,
        &format!("/api/units/{unit_id}"),
        &tokens.teacher,
        json!({ "name": "Carbon", "position": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{unit}");
    assert_eq!(unit["position"], 3);
    assert_eq!(unit["course_id"], course_id);

    let (_, topics) = get(&app, &format!("/api/units/{unit_id}/topics"), &tokens.student).await;
    let topic_id = topics[0]["id"].as_u64().unwrap();
    let (status, _) = put_json(
        &app,
        &format!("/api/topics/{topic_id}"),
        &tokens.teacher,
        json!({ "name": "Alkanes", "description": "single bonds" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, task) = put_json(
        &app,
        &format!("/api/tasks/{}", task_ids[1]),
        &tokens.teacher,
        json!({ "title": "Name ten alkanes", "due_on": "2024-03-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{task}");
    let (_, tasks) = get(&app, &format!("/api/topics/{topic_id}/tasks"), &tokens.student).await;
    assert_eq!(tasks[1]["title"], "Name ten alkanes");
    assert_eq!(tasks[1]["due_on"], "2024-03-01");

    let (status, body) = get(&app, "/api/topics/9999/tasks", &tokens.student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn admin_deletes_a_learner_and_their_progress() {
    let (app, tokens) = seeded_app().await;
    let (course_id, task_ids) = build_course(&app, &tokens.teacher, "Poetry", 2).await;
    let (_, student) = get(&app, "/api/me", &tokens.student).await;
    let student_id = student["id"].as_u64().unwrap();

    post_json(
        &app,
        "/api/enrollments",
        &tokens.student,
        json!({ "course_id": course_id }),
    )
    .await;
    let (status, _) = post_json(
        &app,
        "/api/progress/complete",
        &tokens.student,
        json!({ "course_id": course_id, "task_id": task_ids[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/users/{student_id}");
    let (status, body) = send(&app, "DELETE", &uri, Some(&tokens.teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(&app, "DELETE", &uri, Some(&tokens.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = get(&app, &uri, &tokens.admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    let (status, _) = get(&app, "/api/me", &tokens.student).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_edit_their_own_profile_only() {
    let (app, tokens) = seeded_app().await;
    let (_, student) = get(&app, "/api/me", &tokens.student).await;
    let uri = format!("/api/users/{}", student["id"]);
    let profile = json!({
        "username": "student",
        "full_name": "Renamed Student",
        "email": "renamed@example.com"
    });

    let (status, user) = put_json(&app, &uri, &tokens.student, profile.clone()).await;
    assert_eq!(status, StatusCode::OK, "{user}");
    assert_eq!(user["full_name"], "Renamed Student");

    let mut promote = profile.clone();
    promote["role"] = json!("admin");
    let (status, _) = put_json(&app, &uri, &tokens.student, promote.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = put_json(&app, &uri, &tokens.teacher, profile).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    promote["role"] = json!("teacher");
    let (status, user) = put_json(&app, &uri, &tokens.admin, promote).await;
    assert_eq!(status, StatusCode::OK, "{user}");
    assert_eq!(user["role"], "teacher");
}
