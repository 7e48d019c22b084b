use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::repos::{ChaptersRepo, CommentsRepo, NewComment, RepoError};
use crate::domain::comments::{
    CommentThread, build_comment_threads, ensure_reply_target, normalize_comment_text,
};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("chapter not found")]
    ChapterNotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("only the author or an administrator may delete this comment")]
    Forbidden,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct PostCommentCommand {
    pub title_id: Uuid,
    pub chapter_id: Uuid,
    pub text: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CommentService {
    chapters: Arc<dyn ChaptersRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(chapters: Arc<dyn ChaptersRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { chapters, comments }
    }

    /// Threads for a chapter, newest parent first, replies oldest first.
    pub async fn load_comments(
        &self,
        title_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Vec<CommentThread>, CommentError> {
        let comments = self.comments.list_comments(title_id, chapter_id).await?;
        Ok(build_comment_threads(comments))
    }

    pub async fn post_comment(
        &self,
        viewer: &Viewer,
        command: PostCommentCommand,
    ) -> Result<CommentRecord, CommentError> {
        let text = normalize_comment_text(&command.text)?;

        if self
            .chapters
            .find_chapter(command.title_id, command.chapter_id)
            .await?
            .is_none()
        {
            return Err(CommentError::ChapterNotFound);
        }

        if let Some(parent_id) = command.parent_id {
            let parent = self
                .comments
                .find_comment(parent_id)
                .await?
                .ok_or(CommentError::CommentNotFound)?;
            ensure_reply_target(&parent, command.title_id, command.chapter_id)?;
        }

        let comment = NewComment {
            title_id: command.title_id,
            chapter_id: command.chapter_id,
            author_id: viewer.user_id.clone(),
            author_name: viewer.display_name.clone(),
            author_photo: viewer.photo_url.clone(),
            text,
            parent_id: command.parent_id,
        };
        Ok(self.comments.insert_comment(comment).await?)
    }

    /// Set the viewer's like on a comment. Repeating the same state changes nothing.
    pub async fn like_comment(
        &self,
        viewer: &Viewer,
        comment_id: Uuid,
        liked: bool,
    ) -> Result<CommentRecord, CommentError> {
        match self
            .comments
            .set_comment_like(comment_id, &viewer.user_id, liked)
            .await
        {
            Ok(comment) => Ok(comment),
            Err(RepoError::NotFound) => Err(CommentError::CommentNotFound),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete_comment(&self, viewer: &Viewer, comment_id: Uuid) -> Result<(), CommentError> {
        let comment = self
            .comments
            .find_comment(comment_id)
            .await?
            .ok_or(CommentError::CommentNotFound)?;

        if comment.author_id != viewer.user_id && !viewer.is_admin() {
            return Err(CommentError::Forbidden);
        }

        self.comments.delete_comment(comment_id).await?;
        Ok(())
    }
}
