use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ReadingProgressRepo, RepoError},
    domain::entities::ReadingProgress,
};

use super::{PostgresRepositories, map_sqlx_error};

const PROGRESS_COLUMNS: &str =
    "user_id, title_id, title_name, last_chapter_id, last_chapter_number, last_read_at";

#[derive(sqlx::FromRow)]
struct ProgressRow {
    user_id: String,
    title_id: Uuid,
    title_name: String,
    last_chapter_id: Uuid,
    last_chapter_number: i32,
    last_read_at: OffsetDateTime,
}

impl From<ProgressRow> for ReadingProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            user_id: row.user_id,
            title_id: row.title_id,
            title_name: row.title_name,
            last_chapter_id: row.last_chapter_id,
            last_chapter_number: row.last_chapter_number,
            last_read_at: row.last_read_at,
        }
    }
}

#[async_trait]
impl ReadingProgressRepo for PostgresRepositories {
    async fn upsert_progress(&self, progress: ReadingProgress) -> Result<(), RepoError> {
        // Last write wins; opening an earlier chapter moves progress backwards.
        sqlx::query(
            "INSERT INTO reading_progress \
             (user_id, title_id, title_name, last_chapter_id, last_chapter_number, last_read_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, title_id) DO UPDATE SET \
             title_name = EXCLUDED.title_name, \
             last_chapter_id = EXCLUDED.last_chapter_id, \
             last_chapter_number = EXCLUDED.last_chapter_number, \
             last_read_at = EXCLUDED.last_read_at",
        )
        .bind(progress.user_id)
        .bind(progress.title_id)
        .bind(progress.title_name)
        .bind(progress.last_chapter_id)
        .bind(progress.last_chapter_number)
        .bind(progress.last_read_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        title_id: Uuid,
    ) -> Result<Option<ReadingProgress>, RepoError> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM reading_progress WHERE user_id = $1 AND title_id = $2"
        ))
        .bind(user_id)
        .bind(title_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ReadingProgress::from))
    }

    async fn list_progress(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReadingProgress>, RepoError> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM reading_progress WHERE user_id = $1 \
             ORDER BY last_read_at DESC, title_id DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(i64::from(limit.clamp(1, 200)))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReadingProgress::from).collect())
    }
}
