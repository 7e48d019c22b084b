use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{RatingBreakdown, RatingsRepo, RepoError, TitlesRepo};
use crate::domain::error::DomainError;
use crate::domain::ratings::{RatingAggregate, Stars};

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("title not found")]
    NotFound,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Aggregate after a submission together with what the caller now has on record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingOutcome {
    pub average: f64,
    pub count: i64,
    pub user_stars: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
    pub user_stars: Option<u8>,
    /// Ratings per star value, one star first.
    pub breakdown: RatingBreakdown,
}

#[derive(Clone)]
pub struct RatingService {
    titles: Arc<dyn TitlesRepo>,
    ratings: Arc<dyn RatingsRepo>,
}

impl RatingService {
    pub fn new(titles: Arc<dyn TitlesRepo>, ratings: Arc<dyn RatingsRepo>) -> Self {
        Self { titles, ratings }
    }

    /// Record `stars` for the user, `0` withdrawing any existing rating.
    pub async fn submit_rating(
        &self,
        title_id: Uuid,
        user_id: &str,
        stars: u8,
    ) -> Result<RatingOutcome, RatingError> {
        let stars = Stars::from_submission(stars)?;
        let aggregate = match self.ratings.apply_rating(title_id, user_id, stars).await {
            Ok(aggregate) => aggregate,
            Err(RepoError::NotFound) => return Err(RatingError::NotFound),
            Err(err) => return Err(err.into()),
        };
        Ok(RatingOutcome {
            average: aggregate.average,
            count: aggregate.count,
            user_stars: stars.map(Stars::get),
        })
    }

    pub async fn summary(
        &self,
        title_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<RatingSummary, RatingError> {
        let title = self
            .titles
            .find_title(title_id)
            .await?
            .ok_or(RatingError::NotFound)?;
        let aggregate = RatingAggregate::new(title.rating, title.ratings_count);

        let user_stars = match user_id {
            Some(user_id) => match self.ratings.find_rating(title_id, user_id).await? {
                Some(record) => Some(Stars::from_stored(record.stars)?.get()),
                None => None,
            },
            None => None,
        };

        let breakdown = self.ratings.rating_breakdown(title_id).await?;

        Ok(RatingSummary {
            average: aggregate.average,
            count: aggregate.count,
            user_stars,
            breakdown,
        })
    }
}
