//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "title_status", rename_all = "snake_case")]
pub enum TitleStatus {
    #[default]
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl TitleStatus {
    pub const ALL: [TitleStatus; 4] = [
        TitleStatus::Ongoing,
        TitleStatus::Completed,
        TitleStatus::Hiatus,
        TitleStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TitleStatus::Ongoing => "ongoing",
            TitleStatus::Completed => "completed",
            TitleStatus::Hiatus => "hiatus",
            TitleStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// Catalog listing mode selected by the reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogFilter {
    #[default]
    All,
    Latest,
    Popular,
    Favorites,
}

/// Catalog ordering key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Latest,
    Popular,
    Rating,
    Title,
    Chapters,
}

impl SortField {
    /// Direction applied when the caller does not pick one.
    pub fn default_direction(self) -> SortDirection {
        match self {
            SortField::Title => SortDirection::Asc,
            SortField::Latest | SortField::Popular | SortField::Rating | SortField::Chapters => {
                SortDirection::Desc
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Latest => "latest",
            SortField::Popular => "popular",
            SortField::Rating => "rating",
            SortField::Title => "title",
            SortField::Chapters => "chapters",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Kind of record an admin action touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "audit_subject", rename_all = "snake_case")]
pub enum AuditSubject {
    Title,
    Chapter,
    User,
}

/// Admin actions kept in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "admin_action", rename_all = "snake_case")]
pub enum AdminAction {
    TitleCreated,
    TitleUpdated,
    TitleFeatured,
    TitleUnfeatured,
    TitleDeleted,
    ChapterAdded,
    ChapterDeleted,
    RoleChanged,
}

impl AdminAction {
    pub fn subject(self) -> AuditSubject {
        match self {
            AdminAction::TitleCreated
            | AdminAction::TitleUpdated
            | AdminAction::TitleFeatured
            | AdminAction::TitleUnfeatured
            | AdminAction::TitleDeleted => AuditSubject::Title,
            AdminAction::ChapterAdded | AdminAction::ChapterDeleted => AuditSubject::Chapter,
            AdminAction::RoleChanged => AuditSubject::User,
        }
    }
}
