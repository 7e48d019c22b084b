use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::application::pagination::{PageRequest, UserCursor};
use crate::application::repos::{
    RepoError, StatisticsRepo, StatisticsTotals, StatusCount, TitleQuery, TitlesRepo,
    UserQueryFilter, UsersRepo,
};
use crate::domain::entities::{TitleRecord, UserRecord};
use crate::domain::ratings::round_to_tenth;
use crate::domain::types::{SortField, TitleStatus};

pub const LEADERBOARD_SIZE: u32 = 5;

#[derive(Debug, Error)]
pub enum AdminStatisticsError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsOverview {
    pub totals: StatisticsTotals,
    /// One entry per status, zero-filled.
    pub status_counts: Vec<StatusCount>,
    pub top_titles: Vec<TitleRecord>,
    pub recent_users: Vec<UserRecord>,
}

#[derive(Clone)]
pub struct AdminStatisticsService {
    stats: Arc<dyn StatisticsRepo>,
    titles: Arc<dyn TitlesRepo>,
    users: Arc<dyn UsersRepo>,
}

impl AdminStatisticsService {
    pub fn new(
        stats: Arc<dyn StatisticsRepo>,
        titles: Arc<dyn TitlesRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            stats,
            titles,
            users,
        }
    }

    pub async fn overview(&self) -> Result<StatisticsOverview, AdminStatisticsError> {
        let mut totals = self.stats.totals().await?;
        totals.average_rating = round_to_tenth(totals.average_rating);

        let stored = self.stats.status_counts().await?;
        let status_counts = TitleStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: stored
                    .iter()
                    .find(|entry| entry.status == *status)
                    .map(|entry| entry.count)
                    .unwrap_or(0),
            })
            .collect();

        let top_titles = self
            .titles
            .list_titles(
                &TitleQuery::sorted(SortField::Popular),
                PageRequest::first(LEADERBOARD_SIZE),
            )
            .await?
            .items;
        let recent_users = self
            .users
            .list_users(
                &UserQueryFilter::default(),
                PageRequest::<UserCursor>::first(LEADERBOARD_SIZE),
            )
            .await?
            .items;

        Ok(StatisticsOverview {
            totals,
            status_counts,
            top_titles,
            recent_users,
        })
    }
}
