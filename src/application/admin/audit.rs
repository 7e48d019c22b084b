use std::sync::Arc;

use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::pagination::{AuditCursor, CursorPage, PageRequest};
use crate::application::repos::{AuditFilter, AuditRepo, RepoError};
use crate::domain::entities::{AuditEntry, ChapterRecord, TitleRecord, UserRecord};
use crate::domain::types::AdminAction;

/// A catalog or account change made from the admin console.
#[derive(Debug, Clone, Copy)]
pub enum AdminEvent<'a> {
    TitleCreated(&'a TitleRecord),
    TitleUpdated(&'a TitleRecord),
    FeaturedChanged(&'a TitleRecord),
    TitleDeleted(&'a TitleRecord),
    ChapterAdded(&'a ChapterRecord),
    ChapterDeleted(&'a ChapterRecord),
    RoleChanged(&'a UserRecord),
}

impl AdminEvent<'_> {
    pub fn action(&self) -> AdminAction {
        match self {
            AdminEvent::TitleCreated(_) => AdminAction::TitleCreated,
            AdminEvent::TitleUpdated(_) => AdminAction::TitleUpdated,
            AdminEvent::FeaturedChanged(title) if title.featured => AdminAction::TitleFeatured,
            AdminEvent::FeaturedChanged(_) => AdminAction::TitleUnfeatured,
            AdminEvent::TitleDeleted(_) => AdminAction::TitleDeleted,
            AdminEvent::ChapterAdded(_) => AdminAction::ChapterAdded,
            AdminEvent::ChapterDeleted(_) => AdminAction::ChapterDeleted,
            AdminEvent::RoleChanged(_) => AdminAction::RoleChanged,
        }
    }

    fn title_id(&self) -> Option<Uuid> {
        match self {
            AdminEvent::TitleCreated(title)
            | AdminEvent::TitleUpdated(title)
            | AdminEvent::FeaturedChanged(title)
            | AdminEvent::TitleDeleted(title) => Some(title.id),
            AdminEvent::ChapterAdded(chapter) | AdminEvent::ChapterDeleted(chapter) => {
                Some(chapter.title_id)
            }
            AdminEvent::RoleChanged(_) => None,
        }
    }

    fn subject_id(&self) -> String {
        match self {
            AdminEvent::TitleCreated(title)
            | AdminEvent::TitleUpdated(title)
            | AdminEvent::FeaturedChanged(title)
            | AdminEvent::TitleDeleted(title) => title.id.to_string(),
            AdminEvent::ChapterAdded(chapter) | AdminEvent::ChapterDeleted(chapter) => {
                chapter.id.to_string()
            }
            AdminEvent::RoleChanged(user) => user.id.clone(),
        }
    }

    fn label(&self) -> String {
        match self {
            AdminEvent::TitleCreated(title)
            | AdminEvent::TitleUpdated(title)
            | AdminEvent::FeaturedChanged(title)
            | AdminEvent::TitleDeleted(title) => title.title.clone(),
            AdminEvent::ChapterAdded(chapter) | AdminEvent::ChapterDeleted(chapter) => {
                match chapter.title.as_deref() {
                    Some(name) => format!("Chapter {}: {name}", chapter.chapter_number),
                    None => format!("Chapter {}", chapter.chapter_number),
                }
            }
            AdminEvent::RoleChanged(user) => user.display_name.clone(),
        }
    }

    fn details(&self) -> Value {
        match self {
            AdminEvent::TitleCreated(title) | AdminEvent::TitleUpdated(title) => json!({
                "status": title.status,
                "genres": title.genres,
                "year": title.year,
                "has_cover": title.cover_image.is_some(),
            }),
            AdminEvent::FeaturedChanged(title) => json!({ "featured": title.featured }),
            AdminEvent::TitleDeleted(title) => json!({
                "chapters_count": title.chapters_count,
                "views": title.views,
                "favorites_count": title.favorites_count,
            }),
            AdminEvent::ChapterAdded(chapter) | AdminEvent::ChapterDeleted(chapter) => json!({
                "chapter_number": chapter.chapter_number,
                "pages": chapter.pages.len(),
            }),
            AdminEvent::RoleChanged(user) => json!({ "role": user.role }),
        }
    }
}

/// Records admin console changes and serves the activity log.
#[derive(Clone)]
pub struct AdminAuditService {
    repo: Arc<dyn AuditRepo>,
}

impl AdminAuditService {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, actor: &Viewer, event: AdminEvent<'_>) -> Result<(), RepoError> {
        let action = event.action();
        self.repo
            .append_entry(AuditEntry {
                id: Uuid::new_v4(),
                actor_id: actor.user_id.clone(),
                actor_name: actor.display_name.clone(),
                action,
                subject: action.subject(),
                subject_id: event.subject_id(),
                title_id: event.title_id(),
                label: event.label(),
                details: event.details(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await
    }

    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest<AuditCursor>,
    ) -> Result<CursorPage<AuditEntry>, RepoError> {
        self.repo.list_entries(filter, page).await
    }

    /// Everything done to a title and its chapters, including after the title was deleted.
    pub async fn title_history(
        &self,
        title_id: Uuid,
        page: PageRequest<AuditCursor>,
    ) -> Result<CursorPage<AuditEntry>, RepoError> {
        let filter = AuditFilter {
            title_id: Some(title_id),
            ..AuditFilter::default()
        };
        self.repo.list_entries(&filter, page).await
    }
}
