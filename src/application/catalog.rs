//! Catalog browsing: filtered, sorted, cursor-paged title listings plus the home page and title
//! detail reads.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::pagination::{CatalogCursor, MAX_CATALOG_PAGE_SIZE, PageRequest};
use crate::application::repos::{ChaptersRepo, RepoError, TitleQuery, TitlesRepo};
use crate::domain::catalog::{GENRES, effective_sort, is_known_genre, matches_search};
use crate::domain::entities::{ChapterRecord, TitleRecord};
use crate::domain::ratings::RatingAggregate;
use crate::domain::types::{CatalogFilter, SortDirection, SortField};

pub const HOME_SECTION_SIZE: u32 = 8;

/// Tunables for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub page_size: u32,
    /// Cover shown for titles that have none.
    pub placeholder_cover: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            page_size: 12,
            placeholder_cover: "/placeholder-manga.jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub filter: CatalogFilter,
    pub sort: SortField,
    pub direction: Option<SortDirection>,
    pub genre: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<CatalogCursor>,
}

/// One page of the catalog.
///
/// `has_more` is true whenever the store returned a full page, before the search filter runs.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub items: Vec<TitleRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl CatalogPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub featured: Option<TitleRecord>,
    pub latest: Vec<TitleRecord>,
    pub popular: Vec<TitleRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleDetail {
    pub title: TitleRecord,
    pub chapters: Vec<ChapterRecord>,
    pub rating: RatingAggregate,
    pub favorite: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cursor does not match the requested ordering")]
    CursorMismatch,
    #[error("unknown genre `{0}`")]
    UnknownGenre(String),
    #[error("title not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CatalogService {
    titles: Arc<dyn TitlesRepo>,
    chapters: Arc<dyn ChaptersRepo>,
    options: CatalogOptions,
}

impl CatalogService {
    pub fn new(
        titles: Arc<dyn TitlesRepo>,
        chapters: Arc<dyn ChaptersRepo>,
        options: CatalogOptions,
    ) -> Self {
        Self {
            titles,
            chapters,
            options,
        }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    pub fn genres(&self) -> &'static [&'static str] {
        &GENRES
    }

    /// List one page of titles for the given filter.
    ///
    /// The favorites filter answers an empty page, without touching the store, for anonymous
    /// viewers and for viewers with no favorites.
    pub async fn browse(
        &self,
        query: CatalogQuery,
        viewer: Option<&Viewer>,
    ) -> Result<CatalogPage, CatalogError> {
        let sort = effective_sort(query.filter, query.sort);
        let direction = query.direction.unwrap_or_else(|| sort.default_direction());

        if let Some(cursor) = &query.cursor
            && !cursor.matches(sort, direction)
        {
            return Err(CatalogError::CursorMismatch);
        }

        let genre = match query.genre.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let genre = raw.to_lowercase();
                if !is_known_genre(&genre) {
                    return Err(CatalogError::UnknownGenre(raw.to_string()));
                }
                Some(genre)
            }
        };

        let ids = match query.filter {
            CatalogFilter::Favorites => match viewer {
                Some(viewer) if !viewer.favorites.is_empty() => Some(viewer.favorites.clone()),
                _ => return Ok(CatalogPage::empty()),
            },
            CatalogFilter::All | CatalogFilter::Latest | CatalogFilter::Popular => None,
        };

        let title_query = TitleQuery {
            sort,
            direction,
            genre,
            ids,
            search: None,
        };
        // Stores never return more than the shared bound, so a larger size would hide has_more.
        let page_size = self.options.page_size.clamp(1, MAX_CATALOG_PAGE_SIZE);
        let page = self
            .titles
            .list_titles(&title_query, PageRequest::new(page_size, query.cursor))
            .await?;

        let has_more = page.items.len() == page_size as usize;
        let next_cursor = if has_more { page.next_cursor } else { None };

        let mut items = self.backfill_all(page.items, sort).await;
        if let Some(search) = query.search.as_deref() {
            items.retain(|title| matches_search(title, search));
        }

        Ok(CatalogPage {
            items,
            next_cursor,
            has_more,
        })
    }

    pub async fn home(&self) -> Result<HomeView, CatalogError> {
        let latest = self.section(SortField::Latest).await?;
        let popular = self.section(SortField::Popular).await?;

        let featured = match self.titles.find_featured().await? {
            Some(title) => Some(self.backfill(title, SortField::Latest).await),
            None => latest.first().cloned(),
        };

        Ok(HomeView {
            featured,
            latest,
            popular,
        })
    }

    /// Load a title with its chapters and count the visit.
    pub async fn title_detail(
        &self,
        id: Uuid,
        viewer: Option<&Viewer>,
    ) -> Result<TitleDetail, CatalogError> {
        let title = self
            .titles
            .find_title(id)
            .await?
            .ok_or(CatalogError::NotFound)?;

        match self.titles.increment_title_views(id).await {
            Ok(()) => counter!("kumoscan_views_incremented_total", "entity" => "title").increment(1),
            Err(err) => {
                counter!("kumoscan_counter_increment_failed_total", "entity" => "title").increment(1);
                warn!(
                    target = "kumoscan::catalog",
                    title_id = %id,
                    error = %err,
                    "failed to count title view"
                );
            }
        }

        let chapters = self.chapters.list_chapters(id).await?;
        let mut title = title;
        if title.chapters_count.is_none() {
            title.chapters_count = Some(chapters.len() as i64);
        }
        if title.cover_image.is_none() {
            title.cover_image = Some(self.options.placeholder_cover.clone());
        }

        let rating = RatingAggregate::new(title.rating, title.ratings_count);
        let favorite = viewer.is_some_and(|viewer| viewer.has_favorite(id));

        Ok(TitleDetail {
            title,
            chapters,
            rating,
            favorite,
        })
    }

    async fn section(&self, sort: SortField) -> Result<Vec<TitleRecord>, CatalogError> {
        let page = self
            .titles
            .list_titles(
                &TitleQuery::sorted(sort),
                PageRequest::first(HOME_SECTION_SIZE),
            )
            .await?;
        Ok(self.backfill_all(page.items, sort).await)
    }

    async fn backfill_all(&self, titles: Vec<TitleRecord>, sort: SortField) -> Vec<TitleRecord> {
        join_all(titles.into_iter().map(|title| self.backfill(title, sort))).await
    }

    /// Fill in derived fields a listing row may lack.
    ///
    /// The chapter count is recounted when missing or when it drives the ordering. A missing
    /// cover is re-read from the full record before falling back to the placeholder. Failures
    /// here degrade the row instead of failing the page.
    async fn backfill(&self, mut title: TitleRecord, sort: SortField) -> TitleRecord {
        if title.chapters_count.is_none() || sort == SortField::Chapters {
            match self.chapters.count_chapters(title.id).await {
                Ok(count) => title.chapters_count = Some(i64::try_from(count).unwrap_or(i64::MAX)),
                Err(err) => {
                    warn!(
                        target = "kumoscan::catalog",
                        title_id = %title.id,
                        error = %err,
                        "failed to count chapters"
                    );
                    title.chapters_count.get_or_insert(0);
                }
            }
        }

        if title.cover_image.is_none() {
            let refetched = match self.titles.find_title(title.id).await {
                Ok(found) => found.and_then(|full| full.cover_image),
                Err(err) => {
                    warn!(
                        target = "kumoscan::catalog",
                        title_id = %title.id,
                        error = %err,
                        "failed to re-read title cover"
                    );
                    None
                }
            };
            title.cover_image =
                Some(refetched.unwrap_or_else(|| self.options.placeholder_cover.clone()));
        }

        title
    }
}
