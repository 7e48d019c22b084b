//! Running-average rating aggregation.
//!
//! A title stores its average rounded to one decimal together with the number of ratings that
//! contributed to it. Every change is folded into that pair without rescanning rating rows.

use serde::Serialize;

use crate::domain::error::DomainError;

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = 5;

/// A single user's rating, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Stars(u8);

impl Stars {
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (MIN_STARS..=MAX_STARS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(
                "stars",
                format!("must be between {MIN_STARS} and {MAX_STARS}"),
            ))
        }
    }

    /// Parse a submitted value where `0` withdraws the rating.
    pub fn from_submission(value: u8) -> Result<Option<Self>, DomainError> {
        if value == 0 {
            return Ok(None);
        }
        Self::new(value).map(Some)
    }

    /// Interpret a persisted value, rejecting anything the schema should have prevented.
    pub fn from_stored(value: i16) -> Result<Self, DomainError> {
        u8::try_from(value)
            .ok()
            .and_then(|raw| Self::new(raw).ok())
            .ok_or_else(|| DomainError::invariant(format!("stored rating {value} out of range")))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: i64,
}

impl RatingAggregate {
    pub fn new(average: f64, count: i64) -> Self {
        Self { average, count }
    }

    pub fn empty() -> Self {
        Self {
            average: 0.0,
            count: 0,
        }
    }

    /// Fold a user's rating change into the aggregate.
    ///
    /// `previous` is the user's existing rating, `next` the new one (`None` withdraws it).
    pub fn apply(self, previous: Option<Stars>, next: Option<Stars>) -> Self {
        let n = self.count.max(0);
        let total = self.average * n as f64;

        match (previous, next) {
            (None, None) => self,
            (None, Some(stars)) => {
                let count = n + 1;
                Self::rounded((total + stars.as_f64()) / count as f64, count)
            }
            (Some(_), Some(stars)) if n == 0 => Self::rounded(stars.as_f64(), 1),
            (Some(prev), Some(stars)) => {
                Self::rounded((total - prev.as_f64() + stars.as_f64()) / n as f64, n)
            }
            (Some(prev), None) if n > 1 => {
                let count = n - 1;
                Self::rounded((total - prev.as_f64()) / count as f64, count)
            }
            (Some(_), None) => Self::empty(),
        }
    }

    fn rounded(average: f64, count: i64) -> Self {
        Self {
            average: round_to_tenth(average).clamp(0.0, f64::from(MAX_STARS)),
            count,
        }
    }
}

/// Round to one decimal place, the precision the catalog displays.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
