//! Extractors for the viewer resolved by the identity middleware.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::application::accounts::Viewer;

use super::error::ApiError;

/// A signed-in viewer; rejects with 401 when the request carried no valid token.
#[derive(Debug, Clone)]
pub struct CurrentViewer(pub Viewer);

/// The viewer when one signed in, otherwise an anonymous request.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

impl MaybeViewer {
    pub fn as_ref(&self) -> Option<&Viewer> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for CurrentViewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .map(CurrentViewer)
            .ok_or_else(ApiError::unauthorized)
    }
}

impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeViewer(parts.extensions.get::<Viewer>().cloned()))
    }
}

/// Bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
