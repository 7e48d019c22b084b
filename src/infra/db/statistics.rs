use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, StatisticsRepo, StatisticsTotals, StatusCount},
    domain::types::TitleStatus,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TotalsRow {
    titles: i64,
    chapters: i64,
    users: i64,
    comments: i64,
    views: i64,
    average_rating: f64,
}

#[async_trait]
impl StatisticsRepo for PostgresRepositories {
    async fn totals(&self) -> Result<StatisticsTotals, RepoError> {
        let row = sqlx::query_as::<_, TotalsRow>(
            "SELECT \
                 (SELECT COUNT(*) FROM titles) AS titles, \
                 (SELECT COUNT(*) FROM chapters) AS chapters, \
                 (SELECT COUNT(*) FROM users) AS users, \
                 (SELECT COUNT(*) FROM comments) AS comments, \
                 (SELECT COALESCE(SUM(views), 0)::BIGINT FROM titles) AS views, \
                 (SELECT COALESCE(AVG(rating), 0)::DOUBLE PRECISION \
                     FROM titles WHERE ratings_count > 0) AS average_rating",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(StatisticsTotals {
            titles: Self::convert_count(row.titles)?,
            chapters: Self::convert_count(row.chapters)?,
            users: Self::convert_count(row.users)?,
            comments: Self::convert_count(row.comments)?,
            views: Self::convert_count(row.views)?,
            average_rating: row.average_rating,
        })
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>, RepoError> {
        let rows: Vec<(TitleStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM titles GROUP BY status ORDER BY status")
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(status, count)| {
                Ok(StatusCount {
                    status,
                    count: Self::convert_count(count)?,
                })
            })
            .collect()
    }
}
