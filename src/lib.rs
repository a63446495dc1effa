//! Bookstore catalog API: versioned JSON projections of authors and books,
//! served from a tag-invalidated response cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
