//! Offset pagination for catalog listings.

use thiserror::Error;

use crate::domain::validation::FieldViolation;

pub const DEFAULT_PAGE: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("`{field}` must be a positive integer")]
    NotPositive { field: &'static str },
}

impl PaginationError {
    pub fn violation(&self) -> FieldViolation {
        match self {
            PaginationError::NotPositive { field } => {
                FieldViolation::new(*field, format!("{field} must be greater than or equal to 1"))
            }
        }
    }
}

/// Limits applied when parsing a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 3,
            max_limit: 100,
        }
    }
}

/// A validated page request. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Apply defaults, reject zero values and clamp `limit` to the maximum.
    pub fn parse(
        page: Option<u32>,
        limit: Option<u32>,
        limits: PageLimits,
    ) -> Result<Self, PaginationError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(PaginationError::NotPositive { field: "page" });
        }

        let limit = limit.unwrap_or(limits.default_limit);
        if limit == 0 {
            return Err(PaginationError::NotPositive { field: "limit" });
        }

        Ok(Self {
            page,
            limit: limit.min(limits.max_limit.max(1)),
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip, `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}
