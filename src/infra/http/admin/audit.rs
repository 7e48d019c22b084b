use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::pagination::{AuditCursor, PageRequest};
use crate::application::repos::AuditFilter;
use crate::infra::http::api::error::{ApiError, repo_to_api};
use crate::infra::http::api::models::{AuditListQuery, HistoryQuery};

use super::{AdminState, page_limit};

fn decode_cursor(cursor: Option<&str>) -> Result<Option<AuditCursor>, ApiError> {
    cursor
        .map(AuditCursor::decode)
        .transpose()
        .map_err(|err| ApiError::invalid_cursor(err.to_string()))
}

pub(super) async fn list_audit(
    State(state): State<AdminState>,
    Query(query): Query<AuditListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = decode_cursor(query.cursor.as_deref())?;
    let filter = AuditFilter {
        title_id: query.title_id,
        actor_id: query.actor_id,
        subject: query.subject,
        action: query.action,
    };

    let page = state
        .audit
        .list(&filter, PageRequest::new(page_limit(query.limit), cursor))
        .await
        .map_err(repo_to_api)?;
    Ok(Json(page))
}

pub(super) async fn title_history(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = decode_cursor(query.cursor.as_deref())?;
    let page = state
        .audit
        .title_history(id, PageRequest::new(page_limit(query.limit), cursor))
        .await
        .map_err(repo_to_api)?;
    Ok(Json(page))
}
