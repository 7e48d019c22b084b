mod audit;
mod auth;
mod chapters;
mod health;
mod multipart;
mod state;
mod statistics;
mod titles;
mod users;

pub use state::AdminState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
};

use super::middleware::{log_responses, set_request_context};

const DEFAULT_PAGE_LIMIT: u32 = 20;

fn page_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, 100)
}

pub fn build_admin_router(state: AdminState, upload_body_limit: usize) -> Router {
    let auth_state = state.clone();
    Router::new()
        .route(
            "/admin/v1/titles",
            get(titles::list_titles)
                .post(titles::create_title)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/admin/v1/titles/{id}",
            patch(titles::update_title).delete(titles::delete_title),
        )
        .route("/admin/v1/titles/{id}/featured", post(titles::set_featured))
        .route("/admin/v1/titles/{id}/history", get(audit::title_history))
        .route(
            "/admin/v1/titles/{id}/chapters",
            get(chapters::list_chapters)
                .post(chapters::add_chapter)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/admin/v1/chapters/{id}", delete(chapters::delete_chapter))
        .route("/admin/v1/users", get(users::list_users))
        .route("/admin/v1/users/{id}/role", post(users::set_role))
        .route("/admin/v1/statistics", get(statistics::overview))
        .route("/admin/v1/audit", get(audit::list_audit))
        .route("/admin/v1/_health/db", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth_state, auth::require_admin))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
