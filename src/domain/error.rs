use thiserror::Error;

use super::validation::FieldViolation;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("domain validation failed with {} violation(s)", violations.len())]
    Validation { violations: Vec<FieldViolation> },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::Validation { violations }
    }
}
