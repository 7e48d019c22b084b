//! Domain layer types and invariants.

pub mod catalog;
pub mod comments;
pub mod entities;
pub mod error;
pub mod ratings;
pub mod types;
