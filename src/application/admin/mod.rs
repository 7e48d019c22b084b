//! Application services for the administrative surface.

pub mod audit;
pub mod chapters;
pub mod statistics;
pub mod titles;
pub mod users;

pub use audit::AdminAuditService;
pub use chapters::AdminChapterService;
pub use statistics::AdminStatisticsService;
pub use titles::AdminTitleService;
pub use users::AdminUserService;
