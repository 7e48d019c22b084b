//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{AdminAction, AuditSubject, TitleStatus, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleRecord {
    pub id: Uuid,
    pub title: String,
    pub alternative_title: Option<String>,
    pub description: String,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub status: TitleStatus,
    pub language: String,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
    pub views: i64,
    pub favorites_count: i64,
    /// Denormalized chapter counter; `None` when it was never maintained.
    pub chapters_count: Option<i64>,
    pub ratings_count: i64,
    pub rating: f64,
    pub featured: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterRecord {
    pub id: Uuid,
    pub title_id: Uuid,
    pub chapter_number: i32,
    pub title: Option<String>,
    pub pages: Vec<String>,
    pub views: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub title_id: Uuid,
    pub chapter_id: Uuid,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub text: String,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub parent_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    pub title_id: Uuid,
    pub user_id: String,
    pub stars: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub role: UserRole,
    pub favorites: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Last chapter a user opened for a title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingProgress {
    pub user_id: String,
    pub title_id: Uuid,
    pub title_name: String,
    pub last_chapter_id: Uuid,
    pub last_chapter_number: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_read_at: OffsetDateTime,
}

/// One entry of the admin activity log.
///
/// `title_id` is set for title and chapter actions and survives the title's deletion, so a
/// title's history stays readable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: String,
    pub actor_name: String,
    pub action: AdminAction,
    pub subject: AuditSubject,
    pub subject_id: String,
    pub title_id: Option<Uuid>,
    /// Human-readable name of the subject at the time of the action.
    pub label: String,
    pub details: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
