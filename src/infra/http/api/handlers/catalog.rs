//! Catalog, title detail and rating handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::catalog::CatalogQuery;
use crate::application::pagination::CatalogCursor;

use crate::infra::http::api::error::{ApiError, catalog_to_api, rating_to_api};
use crate::infra::http::api::extract::{CurrentViewer, MaybeViewer};
use crate::infra::http::api::models::{CatalogListQuery, GenresResponse, RatingRequest};
use crate::infra::http::api::state::ApiState;

pub async fn home(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let view = state.catalog.home().await.map_err(catalog_to_api)?;
    Ok(Json(view))
}

pub async fn list_genres(State(state): State<ApiState>) -> impl IntoResponse {
    Json(GenresResponse {
        genres: state.catalog.genres().to_vec(),
    })
}

pub async fn list_titles(
    State(state): State<ApiState>,
    viewer: MaybeViewer,
    Query(query): Query<CatalogListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(CatalogCursor::decode)
        .transpose()
        .map_err(|err| ApiError::invalid_cursor(err.to_string()))?;

    let catalog_query = CatalogQuery {
        filter: query.filter,
        sort: query.sort,
        direction: query.direction,
        genre: query.genre,
        search: query.search,
        cursor,
    };

    let page = state
        .catalog
        .browse(catalog_query, viewer.as_ref())
        .await
        .map_err(catalog_to_api)?;

    Ok(Json(page))
}

pub async fn get_title(
    State(state): State<ApiState>,
    viewer: MaybeViewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .catalog
        .title_detail(id, viewer.as_ref())
        .await
        .map_err(catalog_to_api)?;
    Ok(Json(detail))
}

pub async fn get_rating(
    State(state): State<ApiState>,
    viewer: MaybeViewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = viewer.as_ref().map(|viewer| viewer.user_id.as_str());
    let summary = state
        .ratings
        .summary(id, user_id)
        .await
        .map_err(rating_to_api)?;
    Ok(Json(summary))
}

pub async fn put_rating(
    State(state): State<ApiState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .ratings
        .submit_rating(id, &viewer.user_id, payload.stars)
        .await
        .map_err(rating_to_api)?;
    Ok(Json(outcome))
}
