mod account;
mod catalog;
mod reader;

pub use account::{get_me, list_history, patch_me, put_favorite};
pub use catalog::{get_rating, get_title, home, list_genres, list_titles, put_rating};
pub use reader::{delete_comment, like_comment, list_comments, open_chapter, post_comment};

use axum::extract::State;
use axum::response::Response;

use crate::infra::http::db_health_response;

use super::state::ApiState;

pub async fn db_health(State(state): State<ApiState>) -> Response {
    db_health_response(state.health.health_check().await)
}
