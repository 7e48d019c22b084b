use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{AuditCursor, CursorPage, PageRequest},
    application::repos::{AuditFilter, AuditRepo, RepoError},
    domain::entities::AuditEntry,
    domain::types::{AdminAction, AuditSubject},
};

use super::{PostgresRepositories, map_sqlx_error};

const MAX_AUDIT_PAGE: u32 = 100;

const AUDIT_COLUMNS: &str =
    "id, actor_id, actor_name, action, subject, subject_id, title_id, label, details, created_at";

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    actor_id: String,
    actor_name: String,
    action: AdminAction,
    subject: AuditSubject,
    subject_id: String,
    title_id: Option<Uuid>,
    label: String,
    details: serde_json::Value,
    created_at: OffsetDateTime,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            action: row.action,
            subject: row.subject,
            subject_id: row.subject_id,
            title_id: row.title_id,
            label: row.label,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditRepo for PostgresRepositories {
    async fn append_entry(&self, entry: AuditEntry) -> Result<(), RepoError> {
        sqlx::query(&format!(
            "INSERT INTO audit_entries ({AUDIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(entry.actor_name)
        .bind(entry.action)
        .bind(entry.subject)
        .bind(entry.subject_id)
        .bind(entry.title_id)
        .bind(entry.label)
        .bind(entry.details)
        .bind(entry.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_entries(
        &self,
        filter: &AuditFilter,
        page: PageRequest<AuditCursor>,
    ) -> Result<CursorPage<AuditEntry>, RepoError> {
        let limit = page.limit.clamp(1, MAX_AUDIT_PAGE);
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE TRUE"
        ));

        if let Some(title_id) = filter.title_id {
            qb.push(" AND title_id = ").push_bind(title_id);
        }
        if let Some(actor_id) = filter.actor_id.as_ref() {
            qb.push(" AND actor_id = ").push_bind(actor_id.clone());
        }
        if let Some(subject) = filter.subject {
            qb.push(" AND subject = ").push_bind(subject);
        }
        if let Some(action) = filter.action {
            qb.push(" AND action = ").push_bind(action);
        }
        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at, id) < (")
                .push_bind(cursor.created_at())
                .push(", ")
                .push_bind(cursor.id())
                .push(")");
        }

        // One extra row tells whether another page exists.
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit) + 1);

        let mut entries: Vec<AuditEntry> = qb
            .build_query_as::<AuditRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(AuditEntry::from)
            .collect();

        let next_cursor = if entries.len() > limit as usize {
            entries.truncate(limit as usize);
            entries
                .last()
                .map(|entry| AuditCursor::new(entry.created_at, entry.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(entries, next_cursor))
    }
}
