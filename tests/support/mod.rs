//! In-memory repositories and router wiring shared by the HTTP tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;
use url::Url;

use bookstore::application::auth::{AccessKey, Authenticator};
use bookstore::application::catalog::{CatalogService, CatalogSettings};
use bookstore::application::links::LinkBuilder;
use bookstore::application::pagination::{PageLimits, PageRequest};
use bookstore::application::repos::{
    AuthorsRepo, AuthorsWriteRepo, BooksRepo, BooksWriteRepo, CreateAuthorParams,
    CreateBookParams, RepoError, UpdateBookParams,
};
use bookstore::application::versioning::VersionTag;
use bookstore::cache::{CacheConfig, TaggedCache};
use bookstore::domain::entities::{
    AuthorDraft, AuthorId, AuthorRecord, AuthorWithBooks, BookId, BookRecord, BookWithAuthor,
};
use bookstore::domain::roles::Role;
use bookstore::infra::http::{HttpState, build_router};

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const READER_TOKEN: &str = "reader-secret";
pub const BASE_URL: &str = "http://books.test/";

#[derive(Default)]
struct Tables {
    authors: BTreeMap<AuthorId, AuthorRecord>,
    books: BTreeMap<BookId, BookRecord>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryCatalog {
    tables: Mutex<Tables>,
    pub book_lists: AtomicUsize,
    pub author_lists: AtomicUsize,
}

impl MemoryCatalog {
    pub fn book_lists(&self) -> usize {
        self.book_lists.load(Ordering::SeqCst)
    }

    pub fn author_lists(&self) -> usize {
        self.author_lists.load(Ordering::SeqCst)
    }

    fn author_with_books(tables: &Tables, author: &AuthorRecord) -> AuthorWithBooks {
        AuthorWithBooks {
            author: author.clone(),
            books: tables
                .books
                .values()
                .filter(|book| book.author_id == Some(author.id))
                .cloned()
                .collect(),
        }
    }

    fn book_with_author(tables: &Tables, book: &BookRecord) -> BookWithAuthor {
        BookWithAuthor {
            book: book.clone(),
            author: book
                .author_id
                .and_then(|id| tables.authors.get(&id).cloned()),
        }
    }
}

#[async_trait]
impl AuthorsRepo for MemoryCatalog {
    async fn list_authors(&self, page: PageRequest) -> Result<Vec<AuthorWithBooks>, RepoError> {
        self.author_lists.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        Ok(tables
            .authors
            .values()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|author| Self::author_with_books(&tables, author))
            .collect())
    }

    async fn find_author(&self, id: AuthorId) -> Result<Option<AuthorWithBooks>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .authors
            .get(&id)
            .map(|author| Self::author_with_books(&tables, author)))
    }
}

#[async_trait]
impl AuthorsWriteRepo for MemoryCatalog {
    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let record = AuthorRecord {
            id: tables.next_id,
            last_name: params.draft.last_name,
            first_name: params.draft.first_name,
        };
        tables.authors.insert(record.id, record.clone());
        if let Some(book) = params.book_id.and_then(|id| tables.books.get_mut(&id)) {
            book.author_id = Some(record.id);
        }
        Ok(record)
    }

    async fn update_author(
        &self,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<AuthorRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let record = tables.authors.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.last_name = draft.last_name;
        record.first_name = draft.first_name;
        Ok(record.clone())
    }

    async fn delete_author(&self, id: AuthorId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.authors.remove(&id).ok_or(RepoError::NotFound)?;
        tables.books.retain(|_, book| book.author_id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl BooksRepo for MemoryCatalog {
    async fn list_books(&self, page: PageRequest) -> Result<Vec<BookWithAuthor>, RepoError> {
        self.book_lists.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        Ok(tables
            .books
            .values()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|book| Self::book_with_author(&tables, book))
            .collect())
    }

    async fn find_book(&self, id: BookId) -> Result<Option<BookWithAuthor>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .books
            .get(&id)
            .map(|book| Self::book_with_author(&tables, book)))
    }
}

#[async_trait]
impl BooksWriteRepo for MemoryCatalog {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let author_id = params.author_id.filter(|id| tables.authors.contains_key(id));
        let record = BookRecord {
            id: tables.next_id,
            title: params.draft.title,
            cover_text: params.draft.cover_text,
            comment: params.draft.comment,
            author_id,
        };
        tables.books.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let author_id = params.author_id.filter(|id| tables.authors.contains_key(id));
        let record = tables.books.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.title = params.title;
        record.cover_text = params.cover_text;
        if let Some(comment) = params.comment {
            record.comment = Some(comment);
        }
        record.author_id = author_id;
        Ok(record.clone())
    }

    async fn delete_book(&self, id: BookId) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        tables.books.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

pub fn app() -> (Router, Arc<MemoryCatalog>) {
    let repo = Arc::new(MemoryCatalog::default());
    let base = Url::parse(BASE_URL).expect("valid base url");
    let catalog = CatalogService::new(
        repo.clone(),
        repo.clone(),
        Arc::new(TaggedCache::new(CacheConfig::default())),
        CatalogSettings {
            default_version: VersionTag::from("1.0"),
            page_limits: PageLimits::default(),
            links: LinkBuilder::new(&base),
        },
    );
    let authenticator = Authenticator::new(vec![
        AccessKey {
            name: "admin".to_string(),
            token_sha256: Authenticator::hash_token(ADMIN_TOKEN),
            roles: vec![Role::User, Role::Admin],
        },
        AccessKey {
            name: "reader".to_string(),
            token_sha256: Authenticator::hash_token(READER_TOKEN),
            roles: vec![Role::User],
        },
    ]);
    let state = HttpState {
        catalog,
        authenticator: Arc::new(authenticator),
        db: None,
    };
    (build_router(state), repo)
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("router is infallible")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
