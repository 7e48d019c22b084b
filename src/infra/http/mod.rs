mod admin;
pub mod api;
mod middleware;

pub use admin::{AdminState, build_admin_router};
pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use api::models::HealthResponse;

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => Json(HealthResponse { status: "ok" }).into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
                .into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
