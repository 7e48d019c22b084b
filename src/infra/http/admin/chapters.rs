use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::admin::chapters::AddChapterCommand;
use crate::infra::http::api::error::{ApiError, admin_chapter_to_api};
use crate::infra::http::api::extract::CurrentViewer;
use crate::infra::http::api::models::ChapterPayload;

use super::AdminState;
use super::multipart::read_image_form;

pub(super) async fn list_chapters(
    State(state): State<AdminState>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let chapters = state
        .chapters
        .list_chapters(title_id)
        .await
        .map_err(admin_chapter_to_api)?;
    Ok(Json(chapters))
}

pub(super) async fn add_chapter(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(title_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_image_form::<ChapterPayload>(&mut multipart, "page").await?;

    let command = AddChapterCommand {
        title_id,
        chapter_number: form.payload.chapter_number,
        title: form.payload.title,
        pages: form.images,
    };

    let chapter = state
        .chapters
        .add_chapter(&actor, command)
        .await
        .map_err(admin_chapter_to_api)?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

pub(super) async fn delete_chapter(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chapters
        .delete_chapter(&actor, id)
        .await
        .map_err(admin_chapter_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
