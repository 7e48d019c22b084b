use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::{
    AdminAction, AuditSubject, CatalogFilter, SortDirection, SortField, TitleStatus, UserRole,
};

#[derive(Debug, Default, Deserialize)]
pub struct CatalogListQuery {
    #[serde(default)]
    pub filter: CatalogFilter,
    #[serde(default)]
    pub sort: SortField,
    pub direction: Option<SortDirection>,
    pub genre: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenresResponse {
    pub genres: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// 1..=5, or 0 to withdraw.
    pub stars: u8,
}

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub text: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    #[serde(default = "default_true")]
    pub liked: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProfilePatchRequest {
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Admin title payload, sent as JSON or as the `payload` multipart field.
#[derive(Debug, Deserialize)]
pub struct TitlePayload {
    pub title: String,
    pub alternative_title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub status: TitleStatus,
    pub language: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChapterPayload {
    pub chapter_number: i32,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub title_id: Option<Uuid>,
    pub actor_id: Option<String>,
    pub subject: Option<AuditSubject>,
    pub action: Option<AdminAction>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

fn default_true() -> bool {
    true
}
