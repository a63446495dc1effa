//! Declarative constraints for author and book drafts.
//!
//! Violations are collected rather than short-circuited so a client receives
//! every failing field in a single response.

use serde::Serialize;

use super::entities::{AuthorDraft, BookDraft};
use super::error::DomainError;

const NAME_MAX_CHARS: usize = 255;
const TITLE_MAX_CHARS: usize = 255;
const COMMENT_MAX_CHARS: usize = 255;

/// A single failed constraint, addressed by the client-facing property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    pub property_path: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn not_blank(&mut self, property: &str, value: &str, message: &str) -> bool {
        if value.trim().is_empty() {
            self.0.push(FieldViolation::new(property, message));
            return false;
        }
        true
    }

    fn max_chars(&mut self, property: &str, value: &str, max: usize, subject: &str) {
        if value.chars().count() > max {
            self.0.push(FieldViolation::new(
                property,
                format!("{subject} cannot be longer than {max} characters"),
            ));
        }
    }

    fn finish(self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation(self.0))
        }
    }
}

pub fn validate_author(draft: &AuthorDraft) -> Result<(), DomainError> {
    let mut violations = Violations::default();

    if violations.not_blank(
        "lastName",
        &draft.last_name,
        "The author's last name is required",
    ) {
        violations.max_chars(
            "lastName",
            &draft.last_name,
            NAME_MAX_CHARS,
            "The author's last name",
        );
    }

    if let Some(first_name) = draft.first_name.as_deref() {
        violations.max_chars(
            "firstName",
            first_name,
            NAME_MAX_CHARS,
            "The author's first name",
        );
    }

    violations.finish()
}

pub fn validate_book(draft: &BookDraft) -> Result<(), DomainError> {
    let mut violations = Violations::default();

    if violations.not_blank("title", &draft.title, "The book title is required") {
        violations.max_chars("title", &draft.title, TITLE_MAX_CHARS, "The title");
    }

    if let Some(comment) = draft.comment.as_deref() {
        violations.max_chars("comment", comment, COMMENT_MAX_CHARS, "The comment");
    }

    violations.finish()
}
