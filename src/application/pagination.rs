//! Shared cursor pagination helpers.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::TitleRecord;
use crate::domain::types::{SortDirection, SortField};

/// Largest catalog page any store will return.
pub const MAX_CATALOG_PAGE_SIZE: u32 = 100;

/// Value of the active sort column for the last row of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SortValue {
    Time(OffsetDateTime),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatalogCursorPayload {
    sort: SortField,
    direction: SortDirection,
    value: SortValue,
    id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserCursorPayload {
    created_at: OffsetDateTime,
    id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AuditCursorPayload {
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Keyset cursor for catalog listings; pinned to the ordering it was produced under.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCursor {
    sort: SortField,
    direction: SortDirection,
    value: SortValue,
    id: Uuid,
}

/// Cursor for paginating users in reverse sign-up order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCursor {
    created_at: OffsetDateTime,
    id: String,
}

/// Cursor for paginating audit log entries in reverse chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

impl CatalogCursor {
    pub fn new(sort: SortField, direction: SortDirection, value: SortValue, id: Uuid) -> Self {
        Self {
            sort,
            direction,
            value,
            id,
        }
    }

    /// Build the cursor that resumes right after `title` under the given ordering.
    pub fn after(title: &TitleRecord, sort: SortField, direction: SortDirection) -> Self {
        Self::new(sort, direction, sort_value_of(title, sort), title.id)
    }

    pub fn sort(&self) -> SortField {
        self.sort
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn value(&self) -> &SortValue {
        &self.value
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn matches(&self, sort: SortField, direction: SortDirection) -> bool {
        self.sort == sort && self.direction == direction
    }

    pub fn encode(&self) -> String {
        let payload = CatalogCursorPayload {
            sort: self.sort,
            direction: self.direction,
            value: self.value.clone(),
            id: self.id,
        };
        let serialized = serde_json::to_vec(&payload)
            .expect("serializing catalog cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: CatalogCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            sort: payload.sort,
            direction: payload.direction,
            value: payload.value,
            id: payload.id,
        })
    }
}

/// The column value a title is ordered by for `sort`.
pub fn sort_value_of(title: &TitleRecord, sort: SortField) -> SortValue {
    match sort {
        SortField::Latest => SortValue::Time(title.created_at),
        SortField::Popular => SortValue::Int(title.views),
        SortField::Rating => SortValue::Float(title.rating),
        SortField::Title => SortValue::Text(title.title.clone()),
        SortField::Chapters => SortValue::Int(title.chapters_count.unwrap_or(0)),
    }
}

impl UserCursor {
    pub fn new(created_at: OffsetDateTime, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encode(&self) -> String {
        let payload = UserCursorPayload {
            created_at: self.created_at,
            id: self.id.clone(),
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing user cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: UserCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

impl AuditCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        let payload = AuditCursorPayload {
            created_at: self.created_at,
            id: self.id,
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing audit cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: AuditCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }

    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }
}

/// Cursor-aware page result.
///
/// `next_cursor` is set whenever the page came back full, so a final page that happens to be
/// exactly `limit` long still advertises a successor.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
