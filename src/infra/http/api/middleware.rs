use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::debug;

use crate::application::accounts::Viewer;

use super::error::account_to_api;
use super::extract::bearer_token;
use super::state::ApiState;

/// Resolve the bearer token into a [`Viewer`]. Anonymous requests pass through untouched.
pub async fn resolve_viewer(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return next.run(request).await;
    };

    let viewer = match state.accounts.authenticate(&token).await {
        Ok(viewer) => viewer,
        Err(err) => return account_to_api(err).into_response(),
    };
    request.extensions_mut().insert(viewer.clone());

    // Echoed onto the response so request logging can name the viewer.
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);

    let (allowed, remaining) = state.rate_limiter.allow(&key);
    if !allowed {
        counter!("kumoscan_rate_limited_total").increment(1);
        debug!(
            target = "kumoscan::api::ratelimit",
            client = %key,
            "request refused by rate limiter"
        );
        return super::error::ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(state.rate_limiter.limit()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    response
}

/// Signed-in viewers are limited per account, anonymous clients per address.
fn client_key(request: &Request<Body>) -> String {
    if let Some(viewer) = request.extensions().get::<Viewer>() {
        return format!("user:{}", viewer.user_id);
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("addr:{}", addr.ip());
    }
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    match forwarded {
        Some(addr) => format!("addr:{addr}"),
        None => "anonymous".to_string(),
    }
}
