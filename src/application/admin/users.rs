use std::sync::Arc;

use thiserror::Error;

use crate::application::accounts::Viewer;
use crate::application::admin::audit::{AdminAuditService, AdminEvent};
use crate::application::pagination::{CursorPage, PageRequest, UserCursor};
use crate::application::repos::{RepoError, UserQueryFilter, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

#[derive(Debug, Error)]
pub enum AdminUserError {
    #[error("user not found")]
    NotFound,
    #[error("administrators cannot revoke their own role")]
    SelfDemotion,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AdminUserService {
    users: Arc<dyn UsersRepo>,
    audit: AdminAuditService,
}

impl AdminUserService {
    pub fn new(users: Arc<dyn UsersRepo>, audit: AdminAuditService) -> Self {
        Self { users, audit }
    }

    pub async fn list(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<UserCursor>,
    ) -> Result<CursorPage<UserRecord>, AdminUserError> {
        Ok(self.users.list_users(filter, page).await?)
    }

    pub async fn set_role(
        &self,
        actor: &Viewer,
        user_id: &str,
        role: UserRole,
    ) -> Result<UserRecord, AdminUserError> {
        if actor.user_id == user_id && !role.is_admin() {
            return Err(AdminUserError::SelfDemotion);
        }

        let user = match self.users.set_role(user_id, role).await {
            Ok(user) => user,
            Err(RepoError::NotFound) => return Err(AdminUserError::NotFound),
            Err(err) => return Err(err.into()),
        };

        self.audit
            .record(actor, AdminEvent::RoleChanged(&user))
            .await?;
        Ok(user)
    }
}
