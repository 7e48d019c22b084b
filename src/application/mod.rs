//! Application services layer.

pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod comments;
pub mod error;
pub mod favorites;
pub mod pagination;
pub mod ratings;
pub mod reading;
pub mod repos;
pub mod uploads;
