//! Version- and group-aware projection of catalog entities to JSON objects.
//!
//! Which fields an entity exposes is declared in static [`FieldSpec`] tables.
//! A field is emitted when the current view group is one of its groups and the
//! requested schema version is at least the version that introduced it.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::versioning::VersionTag;
use crate::domain::entities::{AuthorRecord, AuthorWithBooks, BookRecord, BookWithAuthor};

/// A projected entity. Keys appear in field-table order.
pub type Projection = Map<String, Value>;

/// Serialization view, selecting which relations are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewGroup {
    /// Author listings and details: authors expand their books.
    GetAuthors,
    /// Book listings and details: books expand their author.
    GetBooks,
}

impl ViewGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewGroup::GetAuthors => "getAuthors",
            ViewGroup::GetBooks => "getBooks",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub version: &'a VersionTag,
    pub group: ViewGroup,
}

impl<'a> ProjectionContext<'a> {
    pub fn new(version: &'a VersionTag, group: ViewGroup) -> Self {
        Self { version, group }
    }
}

#[derive(Debug, Error)]
#[error("field `{field}` could not be resolved: {reason}")]
pub struct FieldResolutionError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldResolutionError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub type Accessor<T> = fn(&T, &ProjectionContext<'_>) -> Result<Value, FieldResolutionError>;

/// Exposure rule for one output field of `T`.
pub struct FieldSpec<T: 'static> {
    pub name: &'static str,
    /// First schema version exposing the field; `None` means every version.
    pub introduced_at: Option<&'static str>,
    pub groups: &'static [ViewGroup],
    pub accessor: Accessor<T>,
}

impl<T> FieldSpec<T> {
    pub fn is_visible(&self, ctx: &ProjectionContext<'_>) -> bool {
        if !self.groups.contains(&ctx.group) {
            return false;
        }
        match self.introduced_at {
            Some(since) => *ctx.version >= VersionTag::from(since),
            None => true,
        }
    }
}

/// Project `entity` through `fields`. Fails as a whole if any visible field
/// fails to resolve.
pub fn project<T>(
    entity: &T,
    fields: &[FieldSpec<T>],
    ctx: &ProjectionContext<'_>,
) -> Result<Projection, FieldResolutionError> {
    let mut output = Map::new();
    for field in fields.iter().filter(|field| field.is_visible(ctx)) {
        let value = (field.accessor)(entity, ctx)?;
        output.insert(field.name.to_string(), value);
    }
    Ok(output)
}

const BOTH: &[ViewGroup] = &[ViewGroup::GetAuthors, ViewGroup::GetBooks];
const AUTHORS_ONLY: &[ViewGroup] = &[ViewGroup::GetAuthors];
const BOOKS_ONLY: &[ViewGroup] = &[ViewGroup::GetBooks];

fn optional_string(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map_or(Value::Null, |text| Value::String(text.clone()))
}

pub static AUTHOR_FIELDS: &[FieldSpec<AuthorWithBooks>] = &[
    FieldSpec {
        name: "id",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(Value::from(entity.author.id)),
    },
    FieldSpec {
        name: "lastName",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(Value::String(entity.author.last_name.clone())),
    },
    FieldSpec {
        name: "firstName",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(optional_string(&entity.author.first_name)),
    },
    FieldSpec {
        name: "books",
        introduced_at: None,
        groups: AUTHORS_ONLY,
        accessor: author_books,
    },
];

pub static BOOK_FIELDS: &[FieldSpec<BookWithAuthor>] = &[
    FieldSpec {
        name: "id",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(Value::from(entity.book.id)),
    },
    FieldSpec {
        name: "title",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(Value::String(entity.book.title.clone())),
    },
    FieldSpec {
        name: "coverText",
        introduced_at: None,
        groups: BOTH,
        accessor: |entity, _| Ok(optional_string(&entity.book.cover_text)),
    },
    FieldSpec {
        name: "author",
        introduced_at: None,
        groups: BOOKS_ONLY,
        accessor: book_author,
    },
    FieldSpec {
        name: "comment",
        introduced_at: Some("2.0"),
        groups: BOOKS_ONLY,
        accessor: |entity, _| Ok(optional_string(&entity.book.comment)),
    },
];

fn author_books(
    entity: &AuthorWithBooks,
    ctx: &ProjectionContext<'_>,
) -> Result<Value, FieldResolutionError> {
    let mut books = Vec::with_capacity(entity.books.len());
    for book in &entity.books {
        if book.author_id != Some(entity.author.id) {
            return Err(FieldResolutionError::new(
                "books",
                format!(
                    "book {} does not belong to author {}",
                    book.id, entity.author.id
                ),
            ));
        }
        books.push(Value::Object(project_nested_book(book, ctx)?));
    }
    Ok(Value::Array(books))
}

fn book_author(
    entity: &BookWithAuthor,
    ctx: &ProjectionContext<'_>,
) -> Result<Value, FieldResolutionError> {
    match (entity.book.author_id, entity.author.as_ref()) {
        (None, None) => Ok(Value::Null),
        (Some(expected), Some(author)) if author.id == expected => {
            Ok(Value::Object(project_nested_author(author, ctx)?))
        }
        (Some(expected), _) => Err(FieldResolutionError::new(
            "author",
            format!("author {expected} referenced by book {} was not loaded", entity.book.id),
        )),
        (None, Some(author)) => Err(FieldResolutionError::new(
            "author",
            format!(
                "book {} carries author {} without a reference",
                entity.book.id, author.id
            ),
        )),
    }
}

// Nested relations are projected through the same tables; the back-reference
// is left empty since the enclosing view never expands it.

fn project_nested_book(
    book: &BookRecord,
    ctx: &ProjectionContext<'_>,
) -> Result<Projection, FieldResolutionError> {
    let subject = BookWithAuthor {
        book: book.clone(),
        author: None,
    };
    let nested = ProjectionContext::new(ctx.version, ViewGroup::GetAuthors);
    project(&subject, BOOK_FIELDS, &nested)
}

fn project_nested_author(
    author: &AuthorRecord,
    ctx: &ProjectionContext<'_>,
) -> Result<Projection, FieldResolutionError> {
    let subject = AuthorWithBooks {
        author: author.clone(),
        books: Vec::new(),
    };
    let nested = ProjectionContext::new(ctx.version, ViewGroup::GetBooks);
    project(&subject, AUTHOR_FIELDS, &nested)
}
