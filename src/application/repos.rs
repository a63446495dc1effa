//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{
    AuthorDraft, AuthorId, AuthorRecord, AuthorWithBooks, BookDraft, BookId, BookRecord,
    BookWithAuthor,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateAuthorParams {
    pub draft: AuthorDraft,
    /// Book to attach to the new author. An unknown id attaches nothing.
    pub book_id: Option<BookId>,
}

#[derive(Debug, Clone)]
pub struct CreateBookParams {
    pub draft: BookDraft,
    /// An unknown id is stored as "no author".
    pub author_id: Option<AuthorId>,
}

#[derive(Debug, Clone)]
pub struct UpdateBookParams {
    pub id: BookId,
    pub title: String,
    pub cover_text: Option<String>,
    /// `None` keeps the stored comment.
    pub comment: Option<String>,
    /// Replaces the author. `None` or an unknown id detaches it.
    pub author_id: Option<AuthorId>,
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    /// Authors ordered by id, each with every book referencing it.
    async fn list_authors(&self, page: PageRequest) -> Result<Vec<AuthorWithBooks>, RepoError>;

    async fn find_author(&self, id: AuthorId) -> Result<Option<AuthorWithBooks>, RepoError>;
}

#[async_trait]
pub trait AuthorsWriteRepo: AuthorsRepo {
    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] for an unknown id.
    async fn update_author(
        &self,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<AuthorRecord, RepoError>;

    /// Deletes the author and, by cascade, its books.
    async fn delete_author(&self, id: AuthorId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    /// Books ordered by id, each joined with its author.
    async fn list_books(&self, page: PageRequest) -> Result<Vec<BookWithAuthor>, RepoError>;

    async fn find_book(&self, id: BookId) -> Result<Option<BookWithAuthor>, RepoError>;
}

#[async_trait]
pub trait BooksWriteRepo: BooksRepo {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] for an unknown id.
    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError>;

    async fn delete_book(&self, id: BookId) -> Result<(), RepoError>;
}
