//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{
    AuditCursor, CatalogCursor, CursorPage, PageRequest, PaginationError, UserCursor,
};
use crate::domain::entities::{
    AuditEntry, ChapterRecord, CommentRecord, RatingRecord, ReadingProgress, TitleRecord,
    UserRecord,
};
use crate::domain::ratings::{RatingAggregate, Stars};
use crate::domain::types::{
    AdminAction, AuditSubject, SortDirection, SortField, TitleStatus, UserRole,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filters and ordering for title listings.
#[derive(Debug, Clone)]
pub struct TitleQuery {
    pub sort: SortField,
    pub direction: SortDirection,
    pub genre: Option<String>,
    /// Restrict to these ids. Callers must not pass an empty set.
    pub ids: Option<Vec<Uuid>>,
    /// Server-side substring match used by the admin console.
    pub search: Option<String>,
}

impl TitleQuery {
    pub fn sorted(sort: SortField) -> Self {
        Self {
            sort,
            direction: sort.default_direction(),
            genre: None,
            ids: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateTitleParams {
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
    pub featured: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateTitleParams {
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
}

#[async_trait]
pub trait TitlesRepo: Send + Sync {
    async fn list_titles(
        &self,
        query: &TitleQuery,
        page: PageRequest<CatalogCursor>,
    ) -> Result<CursorPage<TitleRecord>, RepoError>;

    async fn find_title(&self, id: Uuid) -> Result<Option<TitleRecord>, RepoError>;

    /// Most recently created featured title.
    async fn find_featured(&self) -> Result<Option<TitleRecord>, RepoError>;

    async fn increment_title_views(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TitlesWriteRepo: Send + Sync {
    async fn create_title(&self, params: CreateTitleParams) -> Result<TitleRecord, RepoError>;

    async fn update_title(&self, params: UpdateTitleParams) -> Result<TitleRecord, RepoError>;

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<TitleRecord, RepoError>;

    /// Delete a title together with everything that hangs off it.
    async fn delete_title(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateChapterParams {
    pub title_id: Uuid,
    pub chapter_number: i32,
    pub title: Option<String>,
    pub pages: Vec<String>,
}

#[async_trait]
pub trait ChaptersRepo: Send + Sync {
    /// Chapters of a title ordered by chapter number ascending.
    async fn list_chapters(&self, title_id: Uuid) -> Result<Vec<ChapterRecord>, RepoError>;

    async fn find_chapter(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<ChapterRecord>, RepoError>;

    async fn count_chapters(&self, title_id: Uuid) -> Result<u64, RepoError>;

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ChaptersWriteRepo: Send + Sync {
    /// Insert a chapter, bump the owning title's chapter counter and touch `last_updated`.
    async fn create_chapter(
        &self,
        params: CreateChapterParams,
    ) -> Result<ChapterRecord, RepoError>;

    /// Remove a chapter and decrement the owning title's counter (never below zero).
    async fn delete_chapter(&self, chapter_id: Uuid) -> Result<ChapterRecord, RepoError>;
}

/// Per-star totals for a title, index 0 holding one-star ratings.
pub type RatingBreakdown = [u64; 5];

#[async_trait]
pub trait RatingsRepo: Send + Sync {
    async fn find_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
    ) -> Result<Option<RatingRecord>, RepoError>;

    /// Store (or remove, for `None`) a user's rating and fold the change into the title
    /// aggregate atomically.
    async fn apply_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
        stars: Option<Stars>,
    ) -> Result<RatingAggregate, RepoError>;

    async fn rating_breakdown(&self, title_id: Uuid) -> Result<RatingBreakdown, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub title_id: Uuid,
    pub chapter_id: Uuid,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub text: String,
    pub parent_id: Option<Uuid>,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// All comments of a chapter, newest first.
    async fn list_comments(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentRecord, RepoError>;

    /// Add or remove `user_id` from the liker set, moving the counter only when the set changes.
    async fn set_comment_like(
        &self,
        id: Uuid,
        user_id: &str,
        liked: bool,
    ) -> Result<CommentRecord, RepoError>;

    /// Delete a comment and its replies.
    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

/// Identity details mirrored into the local profile on sign-in.
#[derive(Debug, Clone)]
pub struct UpsertUserParams {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserQueryFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Create the profile on first sign-in; afterwards only the email is refreshed.
    async fn upsert_user(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError>;

    async fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<UserRecord, RepoError>;

    /// Add or remove a favorite and adjust the title's counter together.
    /// Returns `false` when the favorite set already had the requested state.
    async fn set_favorite(
        &self,
        user_id: &str,
        title_id: Uuid,
        favorite: bool,
    ) -> Result<bool, RepoError>;

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<UserCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError>;

    async fn set_role(&self, id: &str, role: UserRole) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait ReadingProgressRepo: Send + Sync {
    /// Overwrite the stored progress for `(user, title)`.
    async fn upsert_progress(&self, progress: ReadingProgress) -> Result<(), RepoError>;

    async fn find_progress(
        &self,
        user_id: &str,
        title_id: Uuid,
    ) -> Result<Option<ReadingProgress>, RepoError>;

    /// Most recently read first.
    async fn list_progress(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReadingProgress>, RepoError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatisticsTotals {
    pub titles: u64,
    pub chapters: u64,
    pub users: u64,
    pub comments: u64,
    pub views: u64,
    /// Mean of the per-title averages over titles with at least one rating.
    pub average_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: TitleStatus,
    pub count: u64,
}

#[async_trait]
pub trait StatisticsRepo: Send + Sync {
    async fn totals(&self) -> Result<StatisticsTotals, RepoError>;

    async fn status_counts(&self) -> Result<Vec<StatusCount>, RepoError>;
}

/// Exact-match filters over the activity log; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub title_id: Option<Uuid>,
    pub actor_id: Option<String>,
    pub subject: Option<AuditSubject>,
    pub action: Option<AdminAction>,
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_entry(&self, entry: AuditEntry) -> Result<(), RepoError>;

    /// Newest entries first.
    async fn list_entries(
        &self,
        filter: &AuditFilter,
        page: PageRequest<AuditCursor>,
    ) -> Result<CursorPage<AuditEntry>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
