use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::admin::audit::{AdminAuditService, AdminEvent};
use crate::application::repos::{
    ChaptersRepo, ChaptersWriteRepo, CreateChapterParams, RepoError, TitlesRepo,
};
use crate::application::uploads::{ImageHost, ImageHostError, ImageUpload, UploadBatch};
use crate::domain::entities::ChapterRecord;

pub const MAX_CHAPTER_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AdminChapterError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("title not found")]
    TitleNotFound,
    #[error("chapter not found")]
    ChapterNotFound,
    #[error(transparent)]
    Image(#[from] ImageHostError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AddChapterCommand {
    pub title_id: Uuid,
    pub chapter_number: i32,
    pub title: Option<String>,
    /// Page images in reading order.
    pub pages: Vec<ImageUpload>,
}

#[derive(Clone)]
pub struct AdminChapterService {
    titles: Arc<dyn TitlesRepo>,
    reader: Arc<dyn ChaptersRepo>,
    writer: Arc<dyn ChaptersWriteRepo>,
    images: Arc<dyn ImageHost>,
    max_image_bytes: u64,
    audit: AdminAuditService,
}

impl AdminChapterService {
    pub fn new(
        titles: Arc<dyn TitlesRepo>,
        reader: Arc<dyn ChaptersRepo>,
        writer: Arc<dyn ChaptersWriteRepo>,
        images: Arc<dyn ImageHost>,
        max_image_bytes: u64,
        audit: AdminAuditService,
    ) -> Self {
        Self {
            titles,
            reader,
            writer,
            images,
            max_image_bytes,
            audit,
        }
    }

    pub async fn list_chapters(
        &self,
        title_id: Uuid,
    ) -> Result<Vec<ChapterRecord>, AdminChapterError> {
        if self.titles.find_title(title_id).await?.is_none() {
            return Err(AdminChapterError::TitleNotFound);
        }
        Ok(self.reader.list_chapters(title_id).await?)
    }

    /// Host the page images in order, then insert the chapter.
    ///
    /// Pages already hosted are deleted again when any later step fails.
    pub async fn add_chapter(
        &self,
        actor: &Viewer,
        command: AddChapterCommand,
    ) -> Result<ChapterRecord, AdminChapterError> {
        if command.chapter_number < 1 {
            return Err(AdminChapterError::ConstraintViolation("chapter_number"));
        }
        if command.pages.is_empty() {
            return Err(AdminChapterError::ConstraintViolation("pages"));
        }
        let title = command
            .title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if title
            .as_ref()
            .is_some_and(|value| value.chars().count() > MAX_CHAPTER_TITLE_CHARS)
        {
            return Err(AdminChapterError::ConstraintViolation("title"));
        }

        if self.titles.find_title(command.title_id).await?.is_none() {
            return Err(AdminChapterError::TitleNotFound);
        }

        let batch =
            UploadBatch::stage(self.images.clone(), command.pages, self.max_image_bytes).await?;

        let params = CreateChapterParams {
            title_id: command.title_id,
            chapter_number: command.chapter_number,
            title,
            pages: batch.urls(),
        };
        let chapter = match self.writer.create_chapter(params).await {
            Ok(chapter) => chapter,
            Err(err) => {
                batch.rollback().await;
                return Err(match err {
                    RepoError::NotFound => AdminChapterError::TitleNotFound,
                    other => AdminChapterError::Repo(other),
                });
            }
        };
        batch.commit();

        self.audit
            .record(actor, AdminEvent::ChapterAdded(&chapter))
            .await?;
        Ok(chapter)
    }

    pub async fn delete_chapter(
        &self,
        actor: &Viewer,
        chapter_id: Uuid,
    ) -> Result<ChapterRecord, AdminChapterError> {
        let chapter = match self.writer.delete_chapter(chapter_id).await {
            Ok(chapter) => chapter,
            Err(RepoError::NotFound) => return Err(AdminChapterError::ChapterNotFound),
            Err(err) => return Err(err.into()),
        };
        self.audit
            .record(actor, AdminEvent::ChapterDeleted(&chapter))
            .await?;
        Ok(chapter)
    }
}
