//! Catalog rules shared by listing and administration.

use crate::domain::entities::TitleRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{CatalogFilter, SortField};

/// Genres a title may be tagged with.
pub const GENRES: [&str; 12] = [
    "action",
    "adventure",
    "comedy",
    "drama",
    "fantasy",
    "horror",
    "mystery",
    "romance",
    "sci-fi",
    "slice-of-life",
    "sports",
    "supernatural",
];

pub const DEFAULT_LANGUAGE: &str = "Arabic";

/// The `latest` and `popular` listings imply their own ordering.
pub fn effective_sort(filter: CatalogFilter, requested: SortField) -> SortField {
    match filter {
        CatalogFilter::Latest => SortField::Latest,
        CatalogFilter::Popular => SortField::Popular,
        CatalogFilter::All | CatalogFilter::Favorites => requested,
    }
}

/// Case-insensitive substring match over the title name and description.
pub fn matches_search(title: &TitleRecord, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    title.title.to_lowercase().contains(&needle)
        || title.description.to_lowercase().contains(&needle)
}

pub fn is_known_genre(value: &str) -> bool {
    GENRES.contains(&value)
}

/// Lowercase, deduplicate, and validate genre tags while keeping their first-seen order.
pub fn normalize_genres(input: &[String]) -> Result<Vec<String>, DomainError> {
    let mut genres: Vec<String> = Vec::with_capacity(input.len());
    for raw in input {
        let genre = raw.trim().to_lowercase();
        if genre.is_empty() {
            continue;
        }
        if !is_known_genre(&genre) {
            return Err(DomainError::validation(
                "genres",
                format!("unknown genre `{genre}`"),
            ));
        }
        if !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    Ok(genres)
}
