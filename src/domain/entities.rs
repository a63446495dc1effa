//! Domain entities mirrored from persistent storage.

use serde::Serialize;

pub type AuthorId = i64;
pub type BookId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRecord {
    pub id: AuthorId,
    pub last_name: String,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub cover_text: Option<String>,
    pub comment: Option<String>,
    pub author_id: Option<AuthorId>,
}

/// An author together with every book that references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorWithBooks {
    pub author: AuthorRecord,
    pub books: Vec<BookRecord>,
}

/// A book joined with its (optional) author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWithAuthor {
    pub book: BookRecord,
    pub author: Option<AuthorRecord>,
}

/// Writable author fields, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorDraft {
    pub last_name: String,
    pub first_name: Option<String>,
}

/// Writable book fields, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookDraft {
    pub title: String,
    pub cover_text: Option<String>,
    pub comment: Option<String>,
}
