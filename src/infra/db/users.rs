use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{CursorPage, PageRequest, UserCursor},
    application::repos::{RepoError, UpsertUserParams, UserQueryFilter, UsersRepo},
    domain::entities::UserRecord,
    domain::types::UserRole,
};

use super::{PostgresRepositories, map_sqlx_error, util::contains_pattern};

const USER_COLUMNS: &str =
    "id, email, display_name, photo_url, role, favorites, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: Option<String>,
    display_name: String,
    photo_url: Option<String>,
    role: UserRole,
    favorites: Vec<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            photo_url: row.photo_url,
            role: row.role,
            favorites: row.favorites,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn upsert_user(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, display_name, photo_url) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, \
             updated_at = CASE WHEN users.email IS DISTINCT FROM EXCLUDED.email \
                 THEN now() ELSE users.updated_at END \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(params.id)
        .bind(params.email)
        .bind(params.display_name)
        .bind(params.photo_url)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET display_name = $2, photo_url = $3, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(display_name)
        .bind(photo_url)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRecord::from).ok_or(RepoError::NotFound)
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        title_id: Uuid,
        favorite: bool,
    ) -> Result<bool, RepoError> {
        let mut tx = self.begin().await?;

        // The membership guard makes repeated requests no-ops for both the set and the counter.
        let (set_change, counter_change) = if favorite {
            (
                "UPDATE users SET favorites = array_append(favorites, $2), updated_at = now() \
                 WHERE id = $1 AND NOT ($2 = ANY(favorites))",
                "UPDATE titles SET favorites_count = favorites_count + 1 WHERE id = $1",
            )
        } else {
            (
                "UPDATE users SET favorites = array_remove(favorites, $2), updated_at = now() \
                 WHERE id = $1 AND $2 = ANY(favorites)",
                "UPDATE titles SET favorites_count = GREATEST(favorites_count - 1, 0) WHERE id = $1",
            )
        };

        let changed = sqlx::query(set_change)
            .bind(user_id)
            .bind(title_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected()
            > 0;

        if !changed {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            tx.rollback().await.map_err(map_sqlx_error)?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(RepoError::NotFound),
            };
        }

        let counted = sqlx::query(counter_change)
            .bind(title_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        if counted == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<UserCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1 "));

        if let Some(search) = filter.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (display_name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR COALESCE(email, '') ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\')");
        }

        if let Some(role) = filter.role {
            qb.push(" AND role = ");
            qb.push_bind(role);
        }

        if let Some(cursor) = page.cursor.as_ref() {
            qb.push(" AND (created_at < ");
            qb.push_bind(cursor.created_at());
            qb.push(" OR (created_at = ");
            qb.push_bind(cursor.created_at());
            qb.push(" AND id < ");
            qb.push_bind(cursor.id().to_string());
            qb.push("))");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let users: Vec<UserRecord> = rows.into_iter().map(UserRecord::from).collect();
        let next_cursor = if users.len() as u32 == limit {
            users
                .last()
                .map(|user| UserCursor::new(user.created_at, user.id.clone()).encode())
        } else {
            None
        };

        Ok(CursorPage::new(users, next_cursor))
    }

    async fn set_role(&self, id: &str, role: UserRole) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRecord::from).ok_or(RepoError::NotFound)
    }
}
