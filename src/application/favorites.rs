use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::accounts::Viewer;
use crate::application::repos::{RepoError, TitlesRepo, UsersRepo};

#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error("title not found")]
    TitleNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FavoriteState {
    pub title_id: Uuid,
    pub favorite: bool,
    /// False when the favorite set already held the requested state.
    pub changed: bool,
    pub favorites_count: i64,
}

#[derive(Clone)]
pub struct FavoriteService {
    titles: Arc<dyn TitlesRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FavoriteService {
    pub fn new(titles: Arc<dyn TitlesRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { titles, users }
    }

    /// Add or remove a title from the viewer's favorites; repeating a request is a no-op.
    pub async fn set_favorite(
        &self,
        viewer: &Viewer,
        title_id: Uuid,
        favorite: bool,
    ) -> Result<FavoriteState, FavoriteError> {
        if self.titles.find_title(title_id).await?.is_none() {
            return Err(FavoriteError::TitleNotFound);
        }

        let changed = match self
            .users
            .set_favorite(&viewer.user_id, title_id, favorite)
            .await
        {
            Ok(changed) => changed,
            Err(RepoError::NotFound) => return Err(FavoriteError::TitleNotFound),
            Err(err) => return Err(err.into()),
        };

        let favorites_count = self
            .titles
            .find_title(title_id)
            .await?
            .map(|title| title.favorites_count)
            .unwrap_or_default();

        Ok(FavoriteState {
            title_id,
            favorite,
            changed,
            favorites_count,
        })
    }

    pub async fn is_favorite(&self, user_id: &str, title_id: Uuid) -> Result<bool, FavoriteError> {
        let favorite = self
            .users
            .find_user(user_id)
            .await?
            .is_some_and(|user| user.favorites.contains(&title_id));
        Ok(favorite)
    }
}
