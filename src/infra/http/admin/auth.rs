use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::infra::http::api::error::{ApiError, account_to_api};
use crate::infra::http::api::extract::bearer_token;

use super::AdminState;

/// Admit only signed-in viewers holding the admin role.
pub(super) async fn require_admin(
    State(state): State<AdminState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // The health check stays reachable for orchestrators without credentials.
    if request.uri().path() == "/admin/v1/_health/db" {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()) else {
        return ApiError::unauthorized().into_response();
    };

    let viewer = match state.accounts.authenticate(&token).await {
        Ok(viewer) => viewer,
        Err(err) => return account_to_api(err).into_response(),
    };

    if !viewer.is_admin() {
        warn!(
            target = "kumoscan::http::admin",
            user_id = %viewer.user_id,
            path = %request.uri().path(),
            "non-admin viewer refused"
        );
        return ApiError::forbidden("Administrator role required").into_response();
    }

    request.extensions_mut().insert(viewer.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}
