use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RatingBreakdown, RatingsRepo, RepoError},
    domain::entities::RatingRecord,
    domain::ratings::{RatingAggregate, Stars},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct RatingRow {
    title_id: Uuid,
    user_id: String,
    stars: i16,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<RatingRow> for RatingRecord {
    fn from(row: RatingRow) -> Self {
        Self {
            title_id: row.title_id,
            user_id: row.user_id,
            stars: row.stars,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    rating: f64,
    ratings_count: i64,
}

fn stored_stars(value: i16) -> Result<Stars, RepoError> {
    Stars::from_stored(value).map_err(|err| RepoError::Integrity {
        message: err.to_string(),
    })
}

#[async_trait]
impl RatingsRepo for PostgresRepositories {
    async fn find_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
    ) -> Result<Option<RatingRecord>, RepoError> {
        let row = sqlx::query_as::<_, RatingRow>(
            "SELECT title_id, user_id, stars, created_at, updated_at \
             FROM ratings WHERE title_id = $1 AND user_id = $2",
        )
        .bind(title_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RatingRecord::from))
    }

    async fn apply_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
        stars: Option<Stars>,
    ) -> Result<RatingAggregate, RepoError> {
        let mut tx = self.begin().await?;

        // The title row lock serialises concurrent raters of the same title.
        let current = sqlx::query_as::<_, AggregateRow>(
            "SELECT rating, ratings_count FROM titles WHERE id = $1 FOR UPDATE",
        )
        .bind(title_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let previous: Option<i16> = sqlx::query_scalar(
            "SELECT stars FROM ratings WHERE title_id = $1 AND user_id = $2",
        )
        .bind(title_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let previous = previous.map(stored_stars).transpose()?;

        let aggregate = RatingAggregate::new(current.rating, current.ratings_count);
        if previous.is_none() && stars.is_none() {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(aggregate);
        }
        let next = aggregate.apply(previous, stars);

        match stars {
            Some(stars) => {
                sqlx::query(
                    "INSERT INTO ratings (title_id, user_id, stars) VALUES ($1, $2, $3) \
                     ON CONFLICT (title_id, user_id) \
                     DO UPDATE SET stars = EXCLUDED.stars, updated_at = now()",
                )
                .bind(title_id)
                .bind(user_id)
                .bind(i16::from(stars.get()))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            None => {
                sqlx::query("DELETE FROM ratings WHERE title_id = $1 AND user_id = $2")
                    .bind(title_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }

        sqlx::query("UPDATE titles SET rating = $2, ratings_count = $3 WHERE id = $1")
            .bind(title_id)
            .bind(next.average)
            .bind(next.count)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(next)
    }

    async fn rating_breakdown(&self, title_id: Uuid) -> Result<RatingBreakdown, RepoError> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT stars, COUNT(*) FROM ratings WHERE title_id = $1 GROUP BY stars",
        )
        .bind(title_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut breakdown: RatingBreakdown = [0; 5];
        for (stars, count) in rows {
            let stars = stored_stars(stars)?;
            breakdown[usize::from(stars.get() - 1)] = Self::convert_count(count)?;
        }
        Ok(breakdown)
    }
}
