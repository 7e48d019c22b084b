use std::sync::Arc;

use crate::application::accounts::AccountService;
use crate::application::admin::{
    audit::AdminAuditService, chapters::AdminChapterService, statistics::AdminStatisticsService,
    titles::AdminTitleService, users::AdminUserService,
};
use crate::application::repos::HealthRepo;

#[derive(Clone)]
pub struct AdminState {
    pub accounts: Arc<AccountService>,
    pub titles: Arc<AdminTitleService>,
    pub chapters: Arc<AdminChapterService>,
    pub users: Arc<AdminUserService>,
    pub statistics: Arc<AdminStatisticsService>,
    pub audit: Arc<AdminAuditService>,
    pub health: Arc<dyn HealthRepo>,
}
