use async_trait::async_trait;

use crate::{
    application::pagination::PageRequest,
    application::repos::{
        BooksRepo, BooksWriteRepo, CreateBookParams, RepoError, UpdateBookParams,
    },
    domain::entities::{AuthorRecord, BookId, BookRecord, BookWithAuthor},
};

use super::PostgresRepositories;
use super::util::{map_sqlx_error, to_bigint};

const BOOK_WITH_AUTHOR_SELECT: &str = r#"
    SELECT b.id, b.title, b.cover_text, b.comment, b.author_id,
           a.last_name AS author_last_name, a.first_name AS author_first_name
    FROM books b
    LEFT JOIN authors a ON a.id = b.author_id
"#;

#[derive(sqlx::FromRow)]
pub(super) struct BookRow {
    id: i64,
    title: String,
    cover_text: Option<String>,
    comment: Option<String>,
    author_id: Option<i64>,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            cover_text: row.cover_text,
            comment: row.comment,
            author_id: row.author_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookWithAuthorRow {
    #[sqlx(flatten)]
    book: BookRow,
    author_last_name: Option<String>,
    author_first_name: Option<String>,
}

impl From<BookWithAuthorRow> for BookWithAuthor {
    fn from(row: BookWithAuthorRow) -> Self {
        let book = BookRecord::from(row.book);
        let author = match (book.author_id, row.author_last_name) {
            (Some(id), Some(last_name)) => Some(AuthorRecord {
                id,
                last_name,
                first_name: row.author_first_name,
            }),
            _ => None,
        };
        Self { book, author }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn list_books(&self, page: PageRequest) -> Result<Vec<BookWithAuthor>, RepoError> {
        let sql = format!("{BOOK_WITH_AUTHOR_SELECT} ORDER BY b.id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, BookWithAuthorRow>(&sql)
            .bind(i64::from(page.limit()))
            .bind(to_bigint(page.offset())?)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BookWithAuthor::from).collect())
    }

    async fn find_book(&self, id: BookId) -> Result<Option<BookWithAuthor>, RepoError> {
        let sql = format!("{BOOK_WITH_AUTHOR_SELECT} WHERE b.id = $1");
        let row = sqlx::query_as::<_, BookWithAuthorRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookWithAuthor::from))
    }
}

#[async_trait]
impl BooksWriteRepo for PostgresRepositories {
    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        // The sub-select stores NULL for an author id that does not exist.
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (title, cover_text, comment, author_id)
            VALUES ($1, $2, $3, (SELECT id FROM authors WHERE id = $4))
            RETURNING id, title, cover_text, comment, author_id
            "#,
        )
        .bind(&params.draft.title)
        .bind(&params.draft.cover_text)
        .bind(&params.draft.comment)
        .bind(params.author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(BookRecord::from(row))
    }

    async fn update_book(&self, params: UpdateBookParams) -> Result<BookRecord, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $2,
                cover_text = $3,
                comment = COALESCE($4, comment),
                author_id = (SELECT id FROM authors WHERE id = $5)
            WHERE id = $1
            RETURNING id, title, cover_text, comment, author_id
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.cover_text)
        .bind(&params.comment)
        .bind(params.author_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(BookRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_book(&self, id: BookId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
