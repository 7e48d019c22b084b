use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ChaptersRepo, ChaptersWriteRepo, CreateChapterParams, RepoError},
    domain::entities::ChapterRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const CHAPTER_COLUMNS: &str = "id, title_id, chapter_number, title, pages, views, published_at";

#[derive(sqlx::FromRow)]
struct ChapterRow {
    id: Uuid,
    title_id: Uuid,
    chapter_number: i32,
    title: Option<String>,
    pages: Vec<String>,
    views: i64,
    published_at: OffsetDateTime,
}

impl From<ChapterRow> for ChapterRecord {
    fn from(row: ChapterRow) -> Self {
        Self {
            id: row.id,
            title_id: row.title_id,
            chapter_number: row.chapter_number,
            title: row.title,
            pages: row.pages,
            views: row.views,
            published_at: row.published_at,
        }
    }
}

#[async_trait]
impl ChaptersRepo for PostgresRepositories {
    async fn list_chapters(&self, title_id: Uuid) -> Result<Vec<ChapterRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ChapterRow>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE title_id = $1 \
             ORDER BY chapter_number ASC, published_at ASC, id ASC"
        ))
        .bind(title_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ChapterRecord::from).collect())
    }

    async fn find_chapter(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<ChapterRecord>, RepoError> {
        let row = sqlx::query_as::<_, ChapterRow>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1 AND title_id = $2"
        ))
        .bind(chapter_id)
        .bind(title_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ChapterRecord::from))
    }

    async fn count_chapters(&self, title_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE title_id = $1")
            .bind(title_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE chapters SET views = views + 1 WHERE id = $1")
            .bind(chapter_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ChaptersWriteRepo for PostgresRepositories {
    async fn create_chapter(
        &self,
        params: CreateChapterParams,
    ) -> Result<ChapterRecord, RepoError> {
        let mut tx = self.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM titles WHERE id = $1 FOR UPDATE")
                .bind(params.title_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if locked.is_none() {
            return Err(RepoError::NotFound);
        }

        let row = sqlx::query_as::<_, ChapterRow>(&format!(
            "INSERT INTO chapters (id, title_id, chapter_number, title, pages) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.title_id)
        .bind(params.chapter_number)
        .bind(params.title)
        .bind(params.pages)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // An absent counter is rebuilt from the rows rather than started at one.
        sqlx::query(
            "UPDATE titles SET chapters_count = CASE \
                 WHEN chapters_count IS NULL \
                     THEN (SELECT COUNT(*) FROM chapters WHERE title_id = $1) \
                 ELSE chapters_count + 1 \
             END, last_updated = now() \
             WHERE id = $1",
        )
        .bind(params.title_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(ChapterRecord::from(row))
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> Result<ChapterRecord, RepoError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, ChapterRow>(&format!(
            "DELETE FROM chapters WHERE id = $1 RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(chapter_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        sqlx::query(
            "UPDATE titles SET chapters_count = GREATEST(chapters_count - 1, 0) \
             WHERE id = $1 AND chapters_count IS NOT NULL",
        )
        .bind(row.title_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(ChapterRecord::from(row))
    }
}
