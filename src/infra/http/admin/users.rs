use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::application::pagination::{PageRequest, UserCursor};
use crate::application::repos::UserQueryFilter;
use crate::infra::http::api::error::{ApiError, admin_user_to_api};
use crate::infra::http::api::extract::CurrentViewer;
use crate::infra::http::api::models::{AdminListQuery, RoleRequest};

use super::{AdminState, page_limit};

pub(super) async fn list_users(
    State(state): State<AdminState>,
    Query(query): Query<AdminListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(UserCursor::decode)
        .transpose()
        .map_err(|err| ApiError::invalid_cursor(err.to_string()))?;

    let filter = UserQueryFilter {
        search: query.search,
        role: query.role,
    };

    let page = state
        .users
        .list(&filter, PageRequest::new(page_limit(query.limit), cursor))
        .await
        .map_err(admin_user_to_api)?;
    Ok(Json(page))
}

pub(super) async fn set_role(
    State(state): State<AdminState>,
    CurrentViewer(actor): CurrentViewer,
    Path(user_id): Path<String>,
    Json(payload): Json<RoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .set_role(&actor, &user_id, payload.role)
        .await
        .map_err(admin_user_to_api)?;
    Ok(Json(user))
}
