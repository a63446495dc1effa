//! Request payloads accepted by the catalog API.

use serde::Deserialize;

use crate::application::catalog::{AuthorInput, BookInput};
use crate::domain::entities::{AuthorDraft, AuthorId, BookDraft, BookId};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Missing required fields deserialize as empty so validation can name them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorRequest {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub id_book: Option<BookId>,
}

impl From<AuthorRequest> for AuthorInput {
    fn from(request: AuthorRequest) -> Self {
        Self {
            draft: AuthorDraft {
                last_name: request.last_name.unwrap_or_default(),
                first_name: request.first_name,
            },
            book_id: request.id_book,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookRequest {
    pub title: Option<String>,
    pub cover_text: Option<String>,
    pub comment: Option<String>,
    pub id_author: Option<AuthorId>,
}

impl From<BookRequest> for BookInput {
    fn from(request: BookRequest) -> Self {
        Self {
            draft: BookDraft {
                title: request.title.unwrap_or_default(),
                cover_text: request.cover_text,
                comment: request.comment,
            },
            author_id: request.id_author,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_request_uses_camel_case() {
        let request: BookRequest = serde_json::from_str(
            r#"{"title":"Dune","coverText":"Spice","idAuthor":4}"#,
        )
        .unwrap();
        let input = BookInput::from(request);

        assert_eq!(input.draft.title, "Dune");
        assert_eq!(input.draft.cover_text.as_deref(), Some("Spice"));
        assert_eq!(input.author_id, Some(4));
    }

    #[test]
    fn missing_last_name_becomes_empty() {
        let request: AuthorRequest = serde_json::from_str(r#"{"firstName":"Frank"}"#).unwrap();
        let input = AuthorInput::from(request);

        assert!(input.draft.last_name.is_empty());
        assert_eq!(input.book_id, None);
    }
}
