//! Application services layer.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod links;
pub mod pagination;
pub mod projection;
pub mod repos;
pub mod versioning;
