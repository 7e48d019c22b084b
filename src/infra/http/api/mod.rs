pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    let viewer_state = state.clone();
    let rate_state = state.clone();

    Router::new()
        .route("/api/v1/home", get(handlers::home))
        .route("/api/v1/genres", get(handlers::list_genres))
        .route("/api/v1/titles", get(handlers::list_titles))
        .route("/api/v1/titles/{id}", get(handlers::get_title))
        .route(
            "/api/v1/titles/{id}/rating",
            get(handlers::get_rating).put(handlers::put_rating),
        )
        .route(
            "/api/v1/titles/{id}/chapters/{chapter_id}",
            get(handlers::open_chapter),
        )
        .route(
            "/api/v1/titles/{id}/chapters/{chapter_id}/comments",
            get(handlers::list_comments).post(handlers::post_comment),
        )
        .route("/api/v1/comments/{id}/like", post(handlers::like_comment))
        .route("/api/v1/comments/{id}", delete(handlers::delete_comment))
        .route("/api/v1/me", get(handlers::get_me).patch(handlers::patch_me))
        .route("/api/v1/me/history", get(handlers::list_history))
        .route(
            "/api/v1/me/favorites/{title_id}",
            put(handlers::put_favorite),
        )
        .route("/api/v1/_health/db", get(handlers::db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            viewer_state,
            middleware::resolve_viewer,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
