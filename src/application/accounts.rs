//! Reader identity and profile management.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::application::repos::{RepoError, UpsertUserParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

pub const MAX_DISPLAY_NAME_CHARS: usize = 80;

/// Claims returned by the identity provider for a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no identity token supplied")]
    Missing,
    #[error("identity token rejected: {0}")]
    Invalid(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens issued by the external identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// The signed-in reader on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewer {
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub role: UserRole,
    pub favorites: Vec<Uuid>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn has_favorite(&self, title_id: Uuid) -> bool {
        self.favorites.contains(&title_id)
    }
}

impl From<UserRecord> for Viewer {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name,
            photo_url: user.photo_url,
            role: user.role,
            favorites: user.favorites,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UsersRepo>,
}

impl AccountService {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, users: Arc<dyn UsersRepo>) -> Self {
        Self { verifier, users }
    }

    /// Verify a bearer token and load (creating on first sight) the matching profile.
    pub async fn authenticate(&self, token: &str) -> Result<Viewer, AccountError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::Missing.into());
        }
        let identity = self.verifier.verify(token).await?;
        let user = self.ensure_profile(identity).await?;
        Ok(Viewer::from(user))
    }

    /// Mirror identity claims into the local profile.
    ///
    /// A profile is created with the `user` role; existing profiles keep their role, name and
    /// photo so edits made in the app are not overwritten by the provider.
    pub async fn ensure_profile(
        &self,
        identity: VerifiedIdentity,
    ) -> Result<UserRecord, AccountError> {
        let display_name = identity
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                identity
                    .email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Reader".to_string());

        let params = UpsertUserParams {
            id: identity.user_id,
            email: identity.email,
            display_name: truncate_chars(&display_name, MAX_DISPLAY_NAME_CHARS),
            photo_url: identity.photo_url,
        };
        Ok(self.users.upsert_user(params).await?)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserRecord, AccountError> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn update_profile(
        &self,
        viewer: &Viewer,
        command: UpdateProfileCommand,
    ) -> Result<UserRecord, AccountError> {
        let display_name = command.display_name.trim();
        if display_name.is_empty() {
            return Err(AccountError::Validation {
                field: "display_name",
                message: "display name must not be empty".into(),
            });
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(AccountError::Validation {
                field: "display_name",
                message: format!("display name exceeds {MAX_DISPLAY_NAME_CHARS} characters"),
            });
        }

        let photo_url = match command.photo_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(validate_photo_url(raw)?),
        };

        match self
            .users
            .update_profile(&viewer.user_id, display_name, photo_url.as_deref())
            .await
        {
            Ok(user) => Ok(user),
            Err(RepoError::NotFound) => Err(AccountError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate_photo_url(raw: &str) -> Result<String, AccountError> {
    let parsed = Url::parse(raw).map_err(|err| AccountError::Validation {
        field: "photo_url",
        message: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AccountError::Validation {
            field: "photo_url",
            message: "photo url must use http or https".into(),
        });
    }
    Ok(parsed.to_string())
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
