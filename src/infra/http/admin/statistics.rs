use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::api::error::{ApiError, admin_statistics_to_api};

use super::AdminState;

pub(super) async fn overview(
    State(state): State<AdminState>,
) -> Result<impl IntoResponse, ApiError> {
    let overview = state
        .statistics
        .overview()
        .await
        .map_err(admin_statistics_to_api)?;
    Ok(Json(overview))
}
