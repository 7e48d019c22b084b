use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::admin::audit::{AdminAuditService, AdminEvent};
use crate::application::pagination::{CatalogCursor, CursorPage, PageRequest};
use crate::application::repos::{
    CreateTitleParams, RepoError, TitleQuery, TitlesRepo, TitlesWriteRepo, UpdateTitleParams,
};
use crate::application::uploads::{ImageHost, ImageHostError, ImageUpload, UploadBatch};
use crate::domain::catalog::{DEFAULT_LANGUAGE, normalize_genres};
use crate::domain::entities::TitleRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{SortField, TitleStatus};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Error)]
pub enum AdminTitleError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("title not found")]
    NotFound,
    #[error(transparent)]
    Image(#[from] ImageHostError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct TitleFields {
    pub title: String,
    pub alternative_title: Option<String>,
    pub description: String,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub status: TitleStatus,
    pub language: Option<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateTitleCommand {
    pub fields: TitleFields,
    pub featured: bool,
    pub cover: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct UpdateTitleCommand {
    pub id: Uuid,
    pub fields: TitleFields,
}

#[derive(Clone)]
pub struct AdminTitleService {
    reader: Arc<dyn TitlesRepo>,
    writer: Arc<dyn TitlesWriteRepo>,
    images: Arc<dyn ImageHost>,
    max_image_bytes: u64,
    audit: AdminAuditService,
}

impl AdminTitleService {
    pub fn new(
        reader: Arc<dyn TitlesRepo>,
        writer: Arc<dyn TitlesWriteRepo>,
        images: Arc<dyn ImageHost>,
        max_image_bytes: u64,
        audit: AdminAuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            images,
            max_image_bytes,
            audit,
        }
    }

    /// Newest titles first, optionally narrowed by a name or description search.
    pub async fn list(
        &self,
        search: Option<String>,
        page: PageRequest<CatalogCursor>,
    ) -> Result<CursorPage<TitleRecord>, AdminTitleError> {
        let mut query = TitleQuery::sorted(SortField::Latest);
        query.search = search
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(self.reader.list_titles(&query, page).await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<TitleRecord, AdminTitleError> {
        self.reader
            .find_title(id)
            .await?
            .ok_or(AdminTitleError::NotFound)
    }

    /// Create a title, hosting its cover first and deleting it again if the insert fails.
    pub async fn create_title(
        &self,
        actor: &Viewer,
        command: CreateTitleCommand,
    ) -> Result<TitleRecord, AdminTitleError> {
        let fields = normalize_fields(command.fields)?;

        let batch = match command.cover {
            Some(cover) => {
                Some(UploadBatch::stage(self.images.clone(), vec![cover], self.max_image_bytes).await?)
            }
            None => None,
        };
        let cover_image = batch
            .as_ref()
            .and_then(|batch| batch.urls().into_iter().next());

        let params = CreateTitleParams {
            title: fields.title,
            alternative_title: fields.alternative_title,
            description: fields.description,
            author: fields.author,
            artist: fields.artist,
            year: fields.year,
            status: fields.status,
            language: fields.language,
            genres: fields.genres,
            cover_image,
            featured: command.featured,
        };

        let title = match self.writer.create_title(params).await {
            Ok(title) => title,
            Err(err) => {
                if let Some(batch) = batch {
                    batch.rollback().await;
                }
                return Err(err.into());
            }
        };
        if let Some(batch) = batch {
            batch.commit();
        }

        self.audit
            .record(actor, AdminEvent::TitleCreated(&title))
            .await?;
        Ok(title)
    }

    pub async fn update_title(
        &self,
        actor: &Viewer,
        command: UpdateTitleCommand,
    ) -> Result<TitleRecord, AdminTitleError> {
        let fields = normalize_fields(command.fields)?;
        let params = UpdateTitleParams {
            id: command.id,
            title: fields.title,
            alternative_title: fields.alternative_title,
            description: fields.description,
            author: fields.author,
            artist: fields.artist,
            year: fields.year,
            status: fields.status,
            language: fields.language,
            genres: fields.genres,
        };

        let title = match self.writer.update_title(params).await {
            Ok(title) => title,
            Err(RepoError::NotFound) => return Err(AdminTitleError::NotFound),
            Err(err) => return Err(err.into()),
        };
        self.audit
            .record(actor, AdminEvent::TitleUpdated(&title))
            .await?;
        Ok(title)
    }

    pub async fn set_featured(
        &self,
        actor: &Viewer,
        id: Uuid,
        featured: bool,
    ) -> Result<TitleRecord, AdminTitleError> {
        let title = match self.writer.set_featured(id, featured).await {
            Ok(title) => title,
            Err(RepoError::NotFound) => return Err(AdminTitleError::NotFound),
            Err(err) => return Err(err.into()),
        };
        self.audit
            .record(actor, AdminEvent::FeaturedChanged(&title))
            .await?;
        Ok(title)
    }

    /// Delete a title along with its chapters, comments, ratings and progress rows.
    pub async fn delete_title(&self, actor: &Viewer, id: Uuid) -> Result<(), AdminTitleError> {
        let existing = self.find(id).await?;
        self.writer.delete_title(id).await?;
        self.audit
            .record(actor, AdminEvent::TitleDeleted(&existing))
            .await?;
        Ok(())
    }
}

/// Validated, trimmed title fields with the language defaulted.
struct NormalizedFields {
    title: String,
    alternative_title: Option<String>,
    description: String,
    author: Option<String>,
    artist: Option<String>,
    year: Option<i32>,
    status: TitleStatus,
    language: String,
    genres: Vec<String>,
}

fn normalize_fields(fields: TitleFields) -> Result<NormalizedFields, AdminTitleError> {
    let title = fields.title.trim().to_string();
    if title.is_empty() {
        return Err(AdminTitleError::ConstraintViolation("title"));
    }
    let description = fields.description.trim().to_string();
    if description.is_empty() {
        return Err(AdminTitleError::ConstraintViolation("description"));
    }
    if let Some(year) = fields.year
        && !(MIN_YEAR..=MAX_YEAR).contains(&year)
    {
        return Err(AdminTitleError::ConstraintViolation("year"));
    }

    Ok(NormalizedFields {
        title,
        alternative_title: non_empty(fields.alternative_title),
        description,
        author: non_empty(fields.author),
        artist: non_empty(fields.artist),
        year: fields.year,
        status: fields.status,
        language: non_empty(fields.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        genres: normalize_genres(&fields.genres)?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> TitleFields {
        TitleFields {
            title: title.to_string(),
            description: "A long journey".to_string(),
            genres: vec!["Fantasy".to_string()],
            ..TitleFields::default()
        }
    }

    #[test]
    fn normalization_defaults_language_and_trims() {
        let mut input = fields("  Moon Gate ");
        input.author = Some("   ".into());
        let normalized = normalize_fields(input).expect("valid fields");

        assert_eq!(normalized.title, "Moon Gate");
        assert_eq!(normalized.author, None);
        assert_eq!(normalized.language, DEFAULT_LANGUAGE);
        assert_eq!(normalized.genres, vec!["fantasy".to_string()]);
    }

    #[test]
    fn normalization_rejects_missing_title_and_odd_years() {
        assert!(matches!(
            normalize_fields(fields("  ")),
            Err(AdminTitleError::ConstraintViolation("title"))
        ));

        let mut input = fields("Moon Gate");
        input.year = Some(1200);
        assert!(matches!(
            normalize_fields(input),
            Err(AdminTitleError::ConstraintViolation("year"))
        ));

        let mut input = fields("Moon Gate");
        input.genres = vec!["isekai".into()];
        assert!(matches!(
            normalize_fields(input),
            Err(AdminTitleError::Domain(_))
        ));
    }
}
