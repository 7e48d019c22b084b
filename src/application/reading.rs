//! Chapter reader and per-title reading progress.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::repos::{ChaptersRepo, ReadingProgressRepo, RepoError, TitlesRepo};
use crate::domain::entities::{ChapterRecord, ReadingProgress, TitleRecord};

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("title not found")]
    TitleNotFound,
    #[error("chapter not found")]
    ChapterNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Navigation entry for the chapter picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterLink {
    pub id: Uuid,
    pub chapter_number: i32,
    pub title: Option<String>,
}

impl From<&ChapterRecord> for ChapterLink {
    fn from(chapter: &ChapterRecord) -> Self {
        Self {
            id: chapter.id,
            chapter_number: chapter.chapter_number,
            title: chapter.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderView {
    pub title_id: Uuid,
    pub title_name: String,
    pub chapter: ChapterRecord,
    pub chapters: Vec<ChapterLink>,
    pub previous: Option<ChapterLink>,
    pub next: Option<ChapterLink>,
}

#[derive(Clone)]
pub struct ReadingService {
    titles: Arc<dyn TitlesRepo>,
    chapters: Arc<dyn ChaptersRepo>,
    progress: Arc<dyn ReadingProgressRepo>,
}

impl ReadingService {
    pub fn new(
        titles: Arc<dyn TitlesRepo>,
        chapters: Arc<dyn ChaptersRepo>,
        progress: Arc<dyn ReadingProgressRepo>,
    ) -> Self {
        Self {
            titles,
            chapters,
            progress,
        }
    }

    /// Open a chapter: count the view, remember it as the viewer's progress and return the
    /// pages with previous/next navigation.
    pub async fn open_chapter(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
        viewer: Option<&Viewer>,
    ) -> Result<ReaderView, ReadingError> {
        let title = self
            .titles
            .find_title(title_id)
            .await?
            .ok_or(ReadingError::TitleNotFound)?;
        let chapter = self
            .chapters
            .find_chapter(title_id, chapter_id)
            .await?
            .ok_or(ReadingError::ChapterNotFound)?;

        match self.chapters.increment_chapter_views(chapter_id).await {
            Ok(()) => counter!("kumoscan_views_incremented_total", "entity" => "chapter").increment(1),
            Err(err) => {
                counter!("kumoscan_counter_increment_failed_total", "entity" => "chapter").increment(1);
                warn!(
                    target = "kumoscan::reading",
                    chapter_id = %chapter_id,
                    error = %err,
                    "failed to count chapter view"
                );
            }
        }

        if let Some(viewer) = viewer
            && let Err(err) = self.record_progress(viewer, &title, &chapter).await
        {
            warn!(
                target = "kumoscan::reading",
                user_id = %viewer.user_id,
                title_id = %title_id,
                error = %err,
                "failed to record reading progress"
            );
        }

        let chapters = self.chapters.list_chapters(title_id).await?;
        let links: Vec<ChapterLink> = chapters.iter().map(ChapterLink::from).collect();
        let position = links.iter().position(|link| link.id == chapter_id);
        let previous = position
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| links.get(index).cloned());
        let next = position.and_then(|index| links.get(index + 1).cloned());

        Ok(ReaderView {
            title_id,
            title_name: title.title,
            chapter,
            chapters: links,
            previous,
            next,
        })
    }

    /// Overwrite the viewer's progress for the title with this chapter.
    pub async fn record_progress(
        &self,
        viewer: &Viewer,
        title: &TitleRecord,
        chapter: &ChapterRecord,
    ) -> Result<(), ReadingError> {
        let progress = ReadingProgress {
            user_id: viewer.user_id.clone(),
            title_id: title.id,
            title_name: title.title.clone(),
            last_chapter_id: chapter.id,
            last_chapter_number: chapter.chapter_number,
            last_read_at: OffsetDateTime::now_utc(),
        };
        self.progress.upsert_progress(progress).await?;
        Ok(())
    }

    pub async fn progress_for(
        &self,
        user_id: &str,
        title_id: Uuid,
    ) -> Result<Option<ReadingProgress>, ReadingError> {
        Ok(self.progress.find_progress(user_id, title_id).await?)
    }

    pub async fn reading_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReadingProgress>, ReadingError> {
        Ok(self.progress.list_progress(user_id, limit).await?)
    }
}
