//! In-memory adapters shared by the integration tests.
#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use kumoscan::application::accounts::{
    AccountService, IdentityError, IdentityVerifier, VerifiedIdentity, Viewer,
};
use kumoscan::application::admin::{
    AdminAuditService, AdminChapterService, AdminStatisticsService, AdminTitleService,
    AdminUserService,
};
use kumoscan::application::catalog::{CatalogOptions, CatalogService};
use kumoscan::application::comments::CommentService;
use kumoscan::application::favorites::FavoriteService;
use kumoscan::application::pagination::{
    AuditCursor, CatalogCursor, CursorPage, MAX_CATALOG_PAGE_SIZE, PageRequest, SortValue,
    UserCursor, sort_value_of,
};
use kumoscan::application::ratings::RatingService;
use kumoscan::application::reading::ReadingService;
use kumoscan::application::repos::{
    AuditFilter, AuditRepo, ChaptersRepo, ChaptersWriteRepo, CommentsRepo,
    CreateChapterParams, CreateTitleParams, HealthRepo, NewComment, RatingBreakdown, RatingsRepo,
    ReadingProgressRepo, RepoError, StatisticsRepo, StatisticsTotals, StatusCount, TitleQuery,
    TitlesRepo, TitlesWriteRepo, UpdateTitleParams, UpsertUserParams, UserQueryFilter, UsersRepo,
};
use kumoscan::application::uploads::{HostedImage, ImageHost, ImageHostError, ImageUpload};
use kumoscan::domain::catalog::matches_search;
use kumoscan::domain::entities::{
    AuditEntry, ChapterRecord, CommentRecord, RatingRecord, ReadingProgress, TitleRecord,
    UserRecord,
};
use kumoscan::domain::ratings::{RatingAggregate, Stars};
use kumoscan::domain::types::{AdminAction, SortDirection, TitleStatus, UserRole};
use kumoscan::infra::http::{AdminState, ApiRateLimiter, ApiState};

pub const PNG_HEADER: [u8; 24] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x10,
];

pub fn png(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(&PNG_HEADER),
    }
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

/// A title created `minutes` after a fixed epoch.
pub fn sample_title(name: &str, minutes: i64) -> TitleRecord {
    let created_at = epoch() + Duration::minutes(minutes);
    TitleRecord {
        id: Uuid::new_v4(),
        title: name.to_string(),
        alternative_title: None,
        description: format!("{name} description"),
        author: None,
        artist: None,
        year: Some(2020),
        status: TitleStatus::Ongoing,
        language: "Arabic".to_string(),
        genres: vec!["action".to_string()],
        cover_image: Some(format!("https://img.test/{name}.png")),
        views: 0,
        favorites_count: 0,
        chapters_count: Some(0),
        ratings_count: 0,
        rating: 0.0,
        featured: false,
        created_at,
        last_updated: created_at,
    }
}

pub fn sample_chapter(title_id: Uuid, number: i32) -> ChapterRecord {
    ChapterRecord {
        id: Uuid::new_v4(),
        title_id,
        chapter_number: number,
        title: Some(format!("Chapter {number}")),
        pages: vec![format!("https://img.test/{title_id}/{number}/1.png")],
        views: 0,
        published_at: epoch() + Duration::hours(i64::from(number)),
    }
}

pub fn sample_user(id: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: Some(format!("{id}@example.com")),
        display_name: id.to_string(),
        photo_url: None,
        role,
        favorites: Vec::new(),
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn viewer(id: &str) -> Viewer {
    Viewer::from(sample_user(id, UserRole::User))
}

pub fn admin_viewer(id: &str) -> Viewer {
    Viewer::from(sample_user(id, UserRole::Admin))
}

#[derive(Default)]
struct State {
    titles: Vec<TitleRecord>,
    chapters: Vec<ChapterRecord>,
    ratings: Vec<RatingRecord>,
    comments: Vec<CommentRecord>,
    users: Vec<UserRecord>,
    progress: Vec<ReadingProgress>,
    audit: Vec<AuditEntry>,
}

/// Every repository trait backed by vectors behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    queries: AtomicUsize,
    clock: AtomicI64,
    pub fail_view_counters: AtomicBool,
    pub fail_chapter_counts: AtomicBool,
    pub fail_title_insert: AtomicBool,
    pub fail_chapter_insert: AtomicBool,
    pub unhealthy: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn hit(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    /// Strictly increasing timestamps so ordering by time is deterministic.
    fn now(&self) -> OffsetDateTime {
        let step = self.clock.fetch_add(1, Ordering::SeqCst);
        epoch() + Duration::days(365) + Duration::seconds(step)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn reset_queries(&self) {
        self.queries.store(0, Ordering::SeqCst);
    }

    pub fn insert_title(&self, title: TitleRecord) -> Uuid {
        let id = title.id;
        self.state().titles.push(title);
        id
    }

    pub fn insert_chapter(&self, chapter: ChapterRecord) -> Uuid {
        let id = chapter.id;
        self.state().chapters.push(chapter);
        id
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.state().users.push(user);
    }

    pub fn title(&self, id: Uuid) -> Option<TitleRecord> {
        self.state().titles.iter().find(|title| title.id == id).cloned()
    }

    pub fn user(&self, id: &str) -> Option<UserRecord> {
        self.state().users.iter().find(|user| user.id == id).cloned()
    }

    pub fn titles_len(&self) -> usize {
        self.state().titles.len()
    }

    pub fn chapters_of(&self, title_id: Uuid) -> Vec<ChapterRecord> {
        self.state()
            .chapters
            .iter()
            .filter(|chapter| chapter.title_id == title_id)
            .cloned()
            .collect()
    }

    pub fn audit_actions(&self) -> Vec<AdminAction> {
        self.state()
            .audit
            .iter()
            .map(|entry| entry.action)
            .collect()
    }
}

fn compare_values(left: &SortValue, right: &SortValue) -> CmpOrdering {
    match (left, right) {
        (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
        (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
        (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
        (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
        _ => CmpOrdering::Equal,
    }
}

fn directed(ordering: CmpOrdering, direction: SortDirection) -> CmpOrdering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl TitlesRepo for MemoryStore {
    async fn list_titles(
        &self,
        query: &TitleQuery,
        page: PageRequest<CatalogCursor>,
    ) -> Result<CursorPage<TitleRecord>, RepoError> {
        self.hit();
        let state = self.state();
        let mut rows: Vec<TitleRecord> = state
            .titles
            .iter()
            .filter(|title| {
                query
                    .genre
                    .as_ref()
                    .is_none_or(|genre| title.genres.contains(genre))
            })
            .filter(|title| query.ids.as_ref().is_none_or(|ids| ids.contains(&title.id)))
            .filter(|title| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|needle| matches_search(title, needle))
            })
            .cloned()
            .collect();

        let sort = query.sort;
        rows.sort_by(|a, b| {
            directed(
                compare_values(&sort_value_of(a, sort), &sort_value_of(b, sort))
                    .then(a.id.cmp(&b.id)),
                query.direction,
            )
        });

        if let Some(cursor) = &page.cursor {
            rows.retain(|title| {
                let ordering = compare_values(&sort_value_of(title, sort), cursor.value())
                    .then(title.id.cmp(&cursor.id()));
                directed(ordering, query.direction) == CmpOrdering::Greater
            });
        }

        let limit = page.limit.clamp(1, MAX_CATALOG_PAGE_SIZE) as usize;
        rows.truncate(limit);
        let next_cursor = if rows.len() == limit {
            rows.last()
                .map(|last| CatalogCursor::after(last, sort, query.direction).encode())
        } else {
            None
        };
        Ok(CursorPage::new(rows, next_cursor))
    }

    async fn find_title(&self, id: Uuid) -> Result<Option<TitleRecord>, RepoError> {
        self.hit();
        Ok(self.state().titles.iter().find(|t| t.id == id).cloned())
    }

    async fn find_featured(&self) -> Result<Option<TitleRecord>, RepoError> {
        self.hit();
        Ok(self
            .state()
            .titles
            .iter()
            .filter(|title| title.featured)
            .max_by_key(|title| title.created_at)
            .cloned())
    }

    async fn increment_title_views(&self, id: Uuid) -> Result<(), RepoError> {
        self.hit();
        if self.fail_view_counters.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        if let Some(title) = self.state().titles.iter_mut().find(|t| t.id == id) {
            title.views += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl TitlesWriteRepo for MemoryStore {
    async fn create_title(&self, params: CreateTitleParams) -> Result<TitleRecord, RepoError> {
        self.hit();
        if self.fail_title_insert.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("insert refused"));
        }
        let now = self.now();
        let title = TitleRecord {
            id: Uuid::new_v4(),
            title: params.title,
            alternative_title: params.alternative_title,
            description: params.description,
            author: params.author,
            artist: params.artist,
            year: params.year,
            status: params.status,
            language: params.language,
            genres: params.genres,
            cover_image: params.cover_image,
            views: 0,
            favorites_count: 0,
            chapters_count: Some(0),
            ratings_count: 0,
            rating: 0.0,
            featured: params.featured,
            created_at: now,
            last_updated: now,
        };
        self.state().titles.push(title.clone());
        Ok(title)
    }

    async fn update_title(&self, params: UpdateTitleParams) -> Result<TitleRecord, RepoError> {
        self.hit();
        let now = self.now();
        let mut state = self.state();
        let title = state
            .titles
            .iter_mut()
            .find(|t| t.id == params.id)
            .ok_or(RepoError::NotFound)?;
        title.title = params.title;
        title.alternative_title = params.alternative_title;
        title.description = params.description;
        title.author = params.author;
        title.artist = params.artist;
        title.year = params.year;
        title.status = params.status;
        title.language = params.language;
        title.genres = params.genres;
        title.last_updated = now;
        Ok(title.clone())
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<TitleRecord, RepoError> {
        self.hit();
        let mut state = self.state();
        let title = state
            .titles
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RepoError::NotFound)?;
        title.featured = featured;
        Ok(title.clone())
    }

    async fn delete_title(&self, id: Uuid) -> Result<(), RepoError> {
        self.hit();
        let mut state = self.state();
        let before = state.titles.len();
        state.titles.retain(|t| t.id != id);
        if state.titles.len() == before {
            return Err(RepoError::NotFound);
        }
        state.chapters.retain(|c| c.title_id != id);
        state.comments.retain(|c| c.title_id != id);
        state.ratings.retain(|r| r.title_id != id);
        state.progress.retain(|p| p.title_id != id);
        for user in &mut state.users {
            user.favorites.retain(|favorite| *favorite != id);
        }
        Ok(())
    }
}

#[async_trait]
impl ChaptersRepo for MemoryStore {
    async fn list_chapters(&self, title_id: Uuid) -> Result<Vec<ChapterRecord>, RepoError> {
        self.hit();
        let mut chapters = self.chapters_of(title_id);
        chapters.sort_by_key(|chapter| (chapter.chapter_number, chapter.published_at, chapter.id));
        Ok(chapters)
    }

    async fn find_chapter(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<ChapterRecord>, RepoError> {
        self.hit();
        Ok(self
            .state()
            .chapters
            .iter()
            .find(|c| c.id == chapter_id && c.title_id == title_id)
            .cloned())
    }

    async fn count_chapters(&self, title_id: Uuid) -> Result<u64, RepoError> {
        self.hit();
        if self.fail_chapter_counts.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(self.chapters_of(title_id).len() as u64)
    }

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> Result<(), RepoError> {
        self.hit();
        if self.fail_view_counters.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        if let Some(chapter) = self.state().chapters.iter_mut().find(|c| c.id == chapter_id) {
            chapter.views += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl ChaptersWriteRepo for MemoryStore {
    async fn create_chapter(
        &self,
        params: CreateChapterParams,
    ) -> Result<ChapterRecord, RepoError> {
        self.hit();
        if self.fail_chapter_insert.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("insert refused"));
        }
        let now = self.now();
        let mut state = self.state();
        let title = state
            .titles
            .iter_mut()
            .find(|t| t.id == params.title_id)
            .ok_or(RepoError::NotFound)?;
        title.chapters_count = Some(title.chapters_count.unwrap_or(0) + 1);
        title.last_updated = now;

        let chapter = ChapterRecord {
            id: Uuid::new_v4(),
            title_id: params.title_id,
            chapter_number: params.chapter_number,
            title: params.title,
            pages: params.pages,
            views: 0,
            published_at: now,
        };
        state.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> Result<ChapterRecord, RepoError> {
        self.hit();
        let mut state = self.state();
        let index = state
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or(RepoError::NotFound)?;
        let chapter = state.chapters.remove(index);
        state.comments.retain(|c| c.chapter_id != chapter_id);
        if let Some(title) = state.titles.iter_mut().find(|t| t.id == chapter.title_id)
            && let Some(count) = title.chapters_count.as_mut()
        {
            *count = (*count - 1).max(0);
        }
        Ok(chapter)
    }
}

#[async_trait]
impl RatingsRepo for MemoryStore {
    async fn find_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
    ) -> Result<Option<RatingRecord>, RepoError> {
        self.hit();
        Ok(self
            .state()
            .ratings
            .iter()
            .find(|r| r.title_id == title_id && r.user_id == user_id)
            .cloned())
    }

    async fn apply_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
        stars: Option<Stars>,
    ) -> Result<RatingAggregate, RepoError> {
        self.hit();
        let now = self.now();
        let mut state = self.state();
        let title = state
            .titles
            .iter()
            .find(|t| t.id == title_id)
            .ok_or(RepoError::NotFound)?;
        let current = RatingAggregate::new(title.rating, title.ratings_count);

        let index = state
            .ratings
            .iter()
            .position(|r| r.title_id == title_id && r.user_id == user_id);
        let previous = match index {
            Some(index) => Some(
                Stars::from_stored(state.ratings[index].stars)
                    .map_err(RepoError::from_persistence)?,
            ),
            None => None,
        };
        let aggregate = current.apply(previous, stars);

        match (index, stars) {
            (Some(index), Some(stars)) => {
                state.ratings[index].stars = i16::from(stars.get());
                state.ratings[index].updated_at = now;
            }
            (Some(index), None) => {
                state.ratings.remove(index);
            }
            (None, Some(stars)) => state.ratings.push(RatingRecord {
                title_id,
                user_id: user_id.to_string(),
                stars: i16::from(stars.get()),
                created_at: now,
                updated_at: now,
            }),
            (None, None) => {}
        }

        if let Some(title) = state.titles.iter_mut().find(|t| t.id == title_id) {
            title.rating = aggregate.average;
            title.ratings_count = aggregate.count;
        }
        Ok(aggregate)
    }

    async fn rating_breakdown(&self, title_id: Uuid) -> Result<RatingBreakdown, RepoError> {
        self.hit();
        let mut breakdown = [0u64; 5];
        for rating in self.state().ratings.iter().filter(|r| r.title_id == title_id) {
            if let Some(slot) = usize::try_from(rating.stars - 1)
                .ok()
                .and_then(|index| breakdown.get_mut(index))
            {
                *slot += 1;
            }
        }
        Ok(breakdown)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.hit();
        let mut comments: Vec<CommentRecord> = self
            .state()
            .comments
            .iter()
            .filter(|c| c.title_id == title_id && c.chapter_id == chapter_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        self.hit();
        Ok(self.state().comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentRecord, RepoError> {
        self.hit();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            title_id: comment.title_id,
            chapter_id: comment.chapter_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            author_photo: comment.author_photo,
            text: comment.text,
            likes: 0,
            liked_by: Vec::new(),
            parent_id: comment.parent_id,
            created_at: self.now(),
        };
        self.state().comments.push(record.clone());
        Ok(record)
    }

    async fn set_comment_like(
        &self,
        id: Uuid,
        user_id: &str,
        liked: bool,
    ) -> Result<CommentRecord, RepoError> {
        self.hit();
        let mut state = self.state();
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        let present = comment.liked_by.iter().any(|liker| liker == user_id);
        if liked && !present {
            comment.liked_by.push(user_id.to_string());
            comment.likes += 1;
        } else if !liked && present {
            comment.liked_by.retain(|liker| liker != user_id);
            comment.likes = (comment.likes - 1).max(0);
        }
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        self.hit();
        self.state()
            .comments
            .retain(|c| c.id != id && c.parent_id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        self.hit();
        Ok(self.user(id))
    }

    async fn upsert_user(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        self.hit();
        let now = self.now();
        let mut state = self.state();
        if let Some(existing) = state.users.iter_mut().find(|u| u.id == params.id) {
            if existing.email != params.email {
                existing.email = params.email;
                existing.updated_at = now;
            }
            return Ok(existing.clone());
        }
        let user = UserRecord {
            id: params.id,
            email: params.email,
            display_name: params.display_name,
            photo_url: params.photo_url,
            role: UserRole::User,
            favorites: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<UserRecord, RepoError> {
        self.hit();
        let mut state = self.state();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.display_name = display_name.to_string();
        user.photo_url = photo_url.map(str::to_string);
        Ok(user.clone())
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        title_id: Uuid,
        favorite: bool,
    ) -> Result<bool, RepoError> {
        self.hit();
        let mut state = self.state();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(RepoError::NotFound)?;
        let present = user.favorites.contains(&title_id);
        let delta = match (favorite, present) {
            (true, false) => {
                user.favorites.push(title_id);
                1
            }
            (false, true) => {
                user.favorites.retain(|id| *id != title_id);
                -1
            }
            _ => return Ok(false),
        };
        let title = state
            .titles
            .iter_mut()
            .find(|t| t.id == title_id)
            .ok_or(RepoError::NotFound)?;
        title.favorites_count = (title.favorites_count + delta).max(0);
        Ok(true)
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<UserCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError> {
        self.hit();
        let mut users: Vec<UserRecord> = self
            .state()
            .users
            .iter()
            .filter(|user| filter.role.is_none_or(|role| user.role == role))
            .filter(|user| {
                filter.search.as_deref().is_none_or(|needle| {
                    let needle = needle.to_lowercase();
                    user.display_name.to_lowercase().contains(&needle)
                        || user
                            .email
                            .as_deref()
                            .is_some_and(|email| email.to_lowercase().contains(&needle))
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(cursor) = &page.cursor {
            users.retain(|user| {
                (user.created_at, user.id.as_str()) < (cursor.created_at(), cursor.id())
            });
        }
        let limit = page.limit as usize;
        users.truncate(limit);
        let next_cursor = if users.len() == limit {
            users
                .last()
                .map(|last| UserCursor::new(last.created_at, last.id.clone()).encode())
        } else {
            None
        };
        Ok(CursorPage::new(users, next_cursor))
    }

    async fn set_role(&self, id: &str, role: UserRole) -> Result<UserRecord, RepoError> {
        self.hit();
        let mut state = self.state();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }
}

#[async_trait]
impl ReadingProgressRepo for MemoryStore {
    async fn upsert_progress(&self, progress: ReadingProgress) -> Result<(), RepoError> {
        self.hit();
        let mut state = self.state();
        state
            .progress
            .retain(|p| !(p.user_id == progress.user_id && p.title_id == progress.title_id));
        state.progress.push(progress);
        Ok(())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        title_id: Uuid,
    ) -> Result<Option<ReadingProgress>, RepoError> {
        self.hit();
        Ok(self
            .state()
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.title_id == title_id)
            .cloned())
    }

    async fn list_progress(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReadingProgress>, RepoError> {
        self.hit();
        let mut entries: Vec<ReadingProgress> = self
            .state()
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.last_read_at.cmp(&a.last_read_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[async_trait]
impl StatisticsRepo for MemoryStore {
    async fn totals(&self) -> Result<StatisticsTotals, RepoError> {
        self.hit();
        let state = self.state();
        let rated: Vec<f64> = state
            .titles
            .iter()
            .filter(|t| t.ratings_count > 0)
            .map(|t| t.rating)
            .collect();
        let average_rating = if rated.is_empty() {
            0.0
        } else {
            rated.iter().sum::<f64>() / rated.len() as f64
        };
        Ok(StatisticsTotals {
            titles: state.titles.len() as u64,
            chapters: state.chapters.len() as u64,
            users: state.users.len() as u64,
            comments: state.comments.len() as u64,
            views: state.titles.iter().map(|t| t.views.max(0) as u64).sum(),
            average_rating,
        })
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>, RepoError> {
        self.hit();
        let mut counts: HashMap<&'static str, StatusCount> = HashMap::new();
        for title in &self.state().titles {
            counts
                .entry(title.status.as_str())
                .or_insert(StatusCount {
                    status: title.status,
                    count: 0,
                })
                .count += 1;
        }
        Ok(counts.into_values().collect())
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn append_entry(&self, entry: AuditEntry) -> Result<(), RepoError> {
        self.hit();
        self.state().audit.push(entry);
        Ok(())
    }

    async fn list_entries(
        &self,
        filter: &AuditFilter,
        page: PageRequest<AuditCursor>,
    ) -> Result<CursorPage<AuditEntry>, RepoError> {
        self.hit();
        let mut entries: Vec<AuditEntry> = self
            .state()
            .audit
            .iter()
            .filter(|e| filter.title_id.is_none_or(|id| e.title_id == Some(id)))
            .filter(|e| filter.actor_id.as_ref().is_none_or(|actor| &e.actor_id == actor))
            .filter(|e| filter.subject.is_none_or(|subject| e.subject == subject))
            .filter(|e| filter.action.is_none_or(|action| e.action == action))
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(page.limit as usize);
        Ok(CursorPage::new(entries, None))
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

/// Image host that accepts every upload except the `fail_on`-th (1-based).
#[derive(Default)]
pub struct StubImageHost {
    pub fail_on: Option<usize>,
    attempts: AtomicUsize,
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl StubImageHost {
    pub fn failing_on(attempt: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(attempt),
            ..Default::default()
        })
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().expect("uploaded lock").clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("deleted lock").clone()
    }
}

#[async_trait]
impl ImageHost for StubImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(ImageHostError::Transport("connection reset".into()));
        }
        let url = format!("https://img.test/hosted/{attempt}-{}", image.file_name);
        self.uploaded
            .lock()
            .expect("uploaded lock")
            .push(url.clone());
        Ok(HostedImage {
            url,
            delete_url: None,
        })
    }

    async fn delete(&self, image: &HostedImage) -> Result<(), ImageHostError> {
        self.deleted
            .lock()
            .expect("deleted lock")
            .push(image.url.clone());
        Ok(())
    }
}

/// Verifier that maps fixed tokens to identities.
#[derive(Default)]
pub struct StaticVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl StaticVerifier {
    pub fn with(mut self, token: &str, user_id: &str) -> Self {
        self.identities.insert(
            token.to_string(),
            VerifiedIdentity {
                user_id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
                display_name: Some(user_id.to_string()),
                photo_url: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown token".into()))
    }
}

pub const MAX_IMAGE_BYTES: u64 = 1024 * 1024;

pub fn catalog_service(store: &Arc<MemoryStore>) -> CatalogService {
    CatalogService::new(store.clone(), store.clone(), CatalogOptions::default())
}

pub fn rating_service(store: &Arc<MemoryStore>) -> RatingService {
    RatingService::new(store.clone(), store.clone())
}

pub fn comment_service(store: &Arc<MemoryStore>) -> CommentService {
    CommentService::new(store.clone(), store.clone())
}

pub fn reading_service(store: &Arc<MemoryStore>) -> ReadingService {
    ReadingService::new(store.clone(), store.clone(), store.clone())
}

pub fn admin_chapter_service(
    store: &Arc<MemoryStore>,
    host: Arc<StubImageHost>,
) -> AdminChapterService {
    AdminChapterService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        host,
        MAX_IMAGE_BYTES,
        AdminAuditService::new(store.clone()),
    )
}

pub fn admin_title_service(
    store: &Arc<MemoryStore>,
    host: Arc<StubImageHost>,
) -> AdminTitleService {
    AdminTitleService::new(
        store.clone(),
        store.clone(),
        host,
        MAX_IMAGE_BYTES,
        AdminAuditService::new(store.clone()),
    )
}

/// Router states wired to one store, one image host and a token verifier.
pub fn http_states(
    store: &Arc<MemoryStore>,
    verifier: StaticVerifier,
    rate_limit: u32,
) -> (ApiState, AdminState) {
    let host = Arc::new(StubImageHost::default());
    let accounts = Arc::new(AccountService::new(Arc::new(verifier), store.clone()));
    let audit = AdminAuditService::new(store.clone());

    let api = ApiState {
        accounts: accounts.clone(),
        catalog: Arc::new(catalog_service(store)),
        ratings: Arc::new(rating_service(store)),
        comments: Arc::new(comment_service(store)),
        reading: Arc::new(reading_service(store)),
        favorites: Arc::new(FavoriteService::new(store.clone(), store.clone())),
        health: store.clone(),
        rate_limiter: Arc::new(ApiRateLimiter::new(
            std::time::Duration::from_secs(60),
            rate_limit,
        )),
    };
    let admin = AdminState {
        accounts,
        titles: Arc::new(admin_title_service(store, host.clone())),
        chapters: Arc::new(admin_chapter_service(store, host)),
        users: Arc::new(AdminUserService::new(store.clone(), audit.clone())),
        statistics: Arc::new(AdminStatisticsService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        )),
        audit: Arc::new(audit),
        health: store.clone(),
    };
    (api, admin)
}
