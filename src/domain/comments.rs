//! Two-level comment threads.
//!
//! Comments are either top-level or a reply to a top-level comment. Replies to replies do not
//! exist in this model, so threads are represented as a parent plus a flat reply list.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

pub const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Parent,
    Reply { parent_id: Uuid },
}

impl CommentRecord {
    pub fn kind(&self) -> CommentKind {
        match self.parent_id {
            Some(parent_id) => CommentKind::Reply { parent_id },
            None => CommentKind::Parent,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentRecord,
    pub replies: Vec<CommentRecord>,
}

/// Partition a flat comment list into threads.
///
/// Parents keep the order they arrive in (newest first when fetched that way). Replies are
/// attached to their parent oldest first. Replies whose parent is absent are dropped.
pub fn build_comment_threads(comments: Vec<CommentRecord>) -> Vec<CommentThread> {
    let mut parents = Vec::new();
    let mut replies: HashMap<Uuid, Vec<CommentRecord>> = HashMap::new();

    for comment in comments {
        match comment.kind() {
            CommentKind::Parent => parents.push(comment),
            CommentKind::Reply { parent_id } => replies.entry(parent_id).or_default().push(comment),
        }
    }

    parents
        .into_iter()
        .map(|comment| {
            let mut thread_replies = replies.remove(&comment.id).unwrap_or_default();
            thread_replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            CommentThread {
                comment,
                replies: thread_replies,
            }
        })
        .collect()
}

/// Trim and validate comment text.
pub fn normalize_comment_text(text: &str) -> Result<String, DomainError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text", "comment must not be empty"));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(DomainError::validation(
            "text",
            format!("comment exceeds {MAX_COMMENT_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Ensure a new reply targets a top-level comment in the same scope.
pub fn ensure_reply_target(
    parent: &CommentRecord,
    title_id: Uuid,
    chapter_id: Uuid,
) -> Result<(), DomainError> {
    if parent.title_id != title_id || parent.chapter_id != chapter_id {
        return Err(DomainError::validation(
            "parent_id",
            "parent comment belongs to another chapter",
        ));
    }
    if let CommentKind::Reply { .. } = parent.kind() {
        return Err(DomainError::validation(
            "parent_id",
            "replies cannot be nested",
        ));
    }
    Ok(())
}
