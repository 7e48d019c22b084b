//! Signed-in reader handlers: profile, history and favorites.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::accounts::UpdateProfileCommand;
use crate::application::reading::DEFAULT_HISTORY_LIMIT;

use crate::infra::http::api::error::{ApiError, account_to_api, favorite_to_api, reading_to_api};
use crate::infra::http::api::extract::CurrentViewer;
use crate::infra::http::api::models::{FavoriteRequest, HistoryQuery, ProfilePatchRequest};
use crate::infra::http::api::state::ApiState;

pub async fn get_me(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .accounts
        .profile(&viewer.user_id)
        .await
        .map_err(account_to_api)?;
    Ok(Json(profile))
}

pub async fn patch_me(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Json(payload): Json<ProfilePatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateProfileCommand {
        display_name: payload.display_name,
        photo_url: payload.photo_url,
    };
    let profile = state
        .accounts
        .update_profile(&viewer, command)
        .await
        .map_err(account_to_api)?;
    Ok(Json(profile))
}

pub async fn list_history(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
    let history = state
        .reading
        .reading_history(&viewer.user_id, limit)
        .await
        .map_err(reading_to_api)?;
    Ok(Json(history))
}

pub async fn put_favorite(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(title_id): Path<Uuid>,
    Json(payload): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .favorites
        .set_favorite(&viewer, title_id, payload.favorite)
        .await
        .map_err(favorite_to_api)?;
    Ok(Json(outcome))
}
