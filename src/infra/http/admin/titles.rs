use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::admin::titles::{CreateTitleCommand, TitleFields, UpdateTitleCommand};
use crate::application::pagination::{CatalogCursor, PageRequest};
use crate::infra::http::api::error::{ApiError, admin_title_to_api};
use crate::infra::http::api::extract::CurrentViewer;
use crate::infra::http::api::models::{AdminListQuery, FeaturedRequest, TitlePayload};

use super::multipart::read_image_form;
use super::{AdminState, page_limit};

impl From<TitlePayload> for TitleFields {
    fn from(payload: TitlePayload) -> Self {
        Self {
            title: payload.title,
            alternative_title: payload.alternative_title,
            description: payload.description,
            author: payload.author,
            artist: payload.artist,
            year: payload.year,
            status: payload.status,
            language: payload.language,
            genres: payload.genres,
        }
    }
}

pub(super) async fn list_titles(
    State(state): State<AdminState>,
    Query(query): Query<AdminListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(CatalogCursor::decode)
        .transpose()
        .map_err(|err| ApiError::invalid_cursor(err.to_string()))?;

    let page = state
        .titles
        .list(query.search, PageRequest::new(page_limit(query.limit), cursor))
        .await
        .map_err(admin_title_to_api)?;
    Ok(Json(page))
}

pub(super) async fn create_title(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_image_form::<TitlePayload>(&mut multipart, "cover").await?;
    if form.images.len() > 1 {
        return Err(ApiError::invalid_input(
            "Invalid title",
            "at most one cover image",
        ));
    }

    let featured = form.payload.featured;
    let command = CreateTitleCommand {
        fields: TitleFields::from(form.payload),
        featured,
        cover: form.images.into_iter().next(),
    };

    let title = state
        .titles
        .create_title(&actor, command)
        .await
        .map_err(admin_title_to_api)?;
    Ok((StatusCode::CREATED, Json(title)))
}

pub(super) async fn update_title(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<TitlePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateTitleCommand {
        id,
        fields: TitleFields::from(payload),
    };
    let title = state
        .titles
        .update_title(&actor, command)
        .await
        .map_err(admin_title_to_api)?;
    Ok(Json(title))
}

pub(super) async fn set_featured(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeaturedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = state
        .titles
        .set_featured(&actor, id, payload.featured)
        .await
        .map_err(admin_title_to_api)?;
    Ok(Json(title))
}

pub(super) async fn delete_title(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .titles
        .delete_title(&actor, id)
        .await
        .map_err(admin_title_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
