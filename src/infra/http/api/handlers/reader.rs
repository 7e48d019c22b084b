//! Reader and comment handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::comments::PostCommentCommand;

use crate::infra::http::api::error::{ApiError, comment_to_api, reading_to_api};
use crate::infra::http::api::extract::{CurrentViewer, MaybeViewer};
use crate::infra::http::api::models::{CommentCreateRequest, LikeRequest};
use crate::infra::http::api::state::ApiState;

pub async fn open_chapter(
    State(state): State<ApiState>,
    viewer: MaybeViewer,
    Path((title_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .reading
        .open_chapter(title_id, chapter_id, viewer.as_ref())
        .await
        .map_err(reading_to_api)?;
    Ok(Json(view))
}

pub async fn list_comments(
    State(state): State<ApiState>,
    Path((title_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let threads = state
        .comments
        .load_comments(title_id, chapter_id)
        .await
        .map_err(comment_to_api)?;
    Ok(Json(threads))
}

pub async fn post_comment(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path((title_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = PostCommentCommand {
        title_id,
        chapter_id,
        text: payload.text,
        parent_id: payload.parent_id,
    };

    let comment = state
        .comments
        .post_comment(&viewer, command)
        .await
        .map_err(comment_to_api)?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn like_comment(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<LikeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .comments
        .like_comment(&viewer, id, payload.liked)
        .await
        .map_err(comment_to_api)?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .comments
        .delete_comment(&viewer, id)
        .await
        .map_err(comment_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
