use std::sync::Arc;

use crate::application::accounts::AccountService;
use crate::application::catalog::CatalogService;
use crate::application::comments::CommentService;
use crate::application::favorites::FavoriteService;
use crate::application::ratings::RatingService;
use crate::application::reading::ReadingService;
use crate::application::repos::HealthRepo;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub ratings: Arc<RatingService>,
    pub comments: Arc<CommentService>,
    pub reading: Arc<ReadingService>,
    pub favorites: Arc<FavoriteService>,
    pub health: Arc<dyn HealthRepo>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}
