pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod views;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use services::{AppServices, SeededUser, ensure_default_users};

/// Build the router with every API route. Used by [`serve`] and by the
/// integration tests.
pub fn build_router(services: AppServices) -> Router {
    let app_state = state::AppState::new(services);

    Router::new()
        .route("/api/health", get(routes::health))
        // Users
        .route("/api/register", post(routes::users::register))
        .route("/api/me", get(routes::users::me))
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/users/{user_id}",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        // Course hierarchy
        .route(
            "/api/courses",
            get(routes::courses::list_courses).post(routes::courses::create_course),
        )
        .route(
            "/api/courses/{course_id}",
            get(routes::courses::get_course)
                .put(routes::courses::update_course)
                .delete(routes::courses::delete_course),
        )
        .route(
            "/api/courses/{course_id}/units",
            get(routes::courses::list_units).post(routes::courses::create_unit),
        )
        .route(
            "/api/units/{unit_id}",
            put(routes::courses::update_unit).delete(routes::courses::delete_unit),
        )
        .route(
            "/api/units/{unit_id}/topics",
            get(routes::courses::list_topics).post(routes::courses::create_topic),
        )
        .route(
            "/api/topics/{topic_id}",
            put(routes::courses::update_topic).delete(routes::courses::delete_topic),
        )
        .route(
            "/api/topics/{topic_id}/tasks",
            get(routes::courses::list_tasks).post(routes::courses::create_task),
        )
        .route(
            "/api/tasks/{task_id}",
            put(routes::courses::update_task).delete(routes::courses::delete_task),
        )
        // Enrollments
        .route(
            "/api/enrollments",
            get(routes::enrollments::list_mine).post(routes::enrollments::enroll),
        )
        .route(
            "/api/enrollments/{enrollment_id}",
            delete(routes::enrollments::withdraw),
        )
        .route(
            "/api/enrollments/{enrollment_id}/reset",
            post(routes::enrollments::reset),
        )
        .route(
            "/api/enrollments/{enrollment_id}/recalculate",
            post(routes::enrollments::recalculate),
        )
        // Progress
        .route("/api/progress/complete", post(routes::progress::complete))
        .route(
            "/api/progress/courses/{course_id}",
            get(routes::progress::status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the API on `addr` until ctrl-c.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(services: AppServices, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(services);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "course server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("course server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
    }
}

/// Create the default accounts and return what was done for each.
///
/// # Errors
///
/// Returns an error if a lookup or insert fails.
pub async fn seed(services: &AppServices) -> anyhow::Result<Vec<SeededUser>> {
    let seeded = ensure_default_users(&services.users())
        .await
        .context("failed to seed default users")?;
    tracing::info!(
        created = seeded.iter().filter(|s| s.token.is_some()).count(),
        "seed finished"
    );
    Ok(seeded)
}
