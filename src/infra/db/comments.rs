use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CommentsRepo, NewComment, RepoError},
    domain::entities::CommentRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str = "id, title_id, chapter_id, author_id, author_name, author_photo, \
    text, likes, liked_by, parent_id, created_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    title_id: Uuid,
    chapter_id: Uuid,
    author_id: String,
    author_name: String,
    author_photo: Option<String>,
    text: String,
    likes: i64,
    liked_by: Vec<String>,
    parent_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            title_id: row.title_id,
            chapter_id: row.chapter_id,
            author_id: row.author_id,
            author_name: row.author_name,
            author_photo: row.author_photo,
            text: row.text,
            likes: row.likes,
            liked_by: row.liked_by,
            parent_id: row.parent_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_comments(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE title_id = $1 AND chapter_id = $2 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(title_id)
        .bind(chapter_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (id, title_id, chapter_id, author_id, author_name, \
             author_photo, text, parent_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(comment.title_id)
        .bind(comment.chapter_id)
        .bind(comment.author_id)
        .bind(comment.author_name)
        .bind(comment.author_photo)
        .bind(comment.text)
        .bind(comment.parent_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord::from(row))
    }

    async fn set_comment_like(
        &self,
        id: Uuid,
        user_id: &str,
        liked: bool,
    ) -> Result<CommentRecord, RepoError> {
        // Membership in `liked_by` guards the update, so the counter only moves with the set.
        let statement = if liked {
            format!(
                "UPDATE comments SET liked_by = array_append(liked_by, $2), likes = likes + 1 \
                 WHERE id = $1 AND NOT ($2 = ANY(liked_by)) RETURNING {COMMENT_COLUMNS}"
            )
        } else {
            format!(
                "UPDATE comments SET liked_by = array_remove(liked_by, $2), \
                 likes = GREATEST(likes - 1, 0) \
                 WHERE id = $1 AND $2 = ANY(liked_by) RETURNING {COMMENT_COLUMNS}"
            )
        };

        let updated = sqlx::query_as::<_, CommentRow>(&statement)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match updated {
            Some(row) => Ok(CommentRecord::from(row)),
            None => self.find_comment(id).await?.ok_or(RepoError::NotFound),
        }
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
