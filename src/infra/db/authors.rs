use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    application::pagination::PageRequest,
    application::repos::{AuthorsRepo, AuthorsWriteRepo, CreateAuthorParams, RepoError},
    domain::entities::{AuthorDraft, AuthorId, AuthorRecord, AuthorWithBooks, BookRecord},
};

use super::PostgresRepositories;
use super::books::BookRow;
use super::util::{map_sqlx_error, to_bigint};

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    last_name: String,
    first_name: Option<String>,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            last_name: row.last_name,
            first_name: row.first_name,
        }
    }
}

impl PostgresRepositories {
    /// Attach each author's books with a single follow-up query.
    async fn with_books(
        &self,
        authors: Vec<AuthorRecord>,
    ) -> Result<Vec<AuthorWithBooks>, RepoError> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = authors.iter().map(|author| author.id).collect();
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT id, title, cover_text, comment, author_id
            FROM books
            WHERE author_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut by_author: HashMap<AuthorId, Vec<BookRecord>> = HashMap::new();
        for book in rows.into_iter().map(BookRecord::from) {
            if let Some(author_id) = book.author_id {
                by_author.entry(author_id).or_default().push(book);
            }
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let books = by_author.remove(&author.id).unwrap_or_default();
                AuthorWithBooks { author, books }
            })
            .collect())
    }
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn list_authors(&self, page: PageRequest) -> Result<Vec<AuthorWithBooks>, RepoError> {
        let rows = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT id, last_name, first_name
            FROM authors
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(page.limit()))
        .bind(to_bigint(page.offset())?)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.with_books(rows.into_iter().map(AuthorRecord::from).collect())
            .await
    }

    async fn find_author(&self, id: AuthorId) -> Result<Option<AuthorWithBooks>, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT id, last_name, first_name
            FROM authors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(self
                .with_books(vec![AuthorRecord::from(row)])
                .await?
                .pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AuthorsWriteRepo for PostgresRepositories {
    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            INSERT INTO authors (last_name, first_name)
            VALUES ($1, $2)
            RETURNING id, last_name, first_name
            "#,
        )
        .bind(&params.draft.last_name)
        .bind(&params.draft.first_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // An unknown book id matches no row and attaches nothing.
        if let Some(book_id) = params.book_id {
            sqlx::query("UPDATE books SET author_id = $1 WHERE id = $2")
                .bind(row.id)
                .bind(book_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(AuthorRecord::from(row))
    }

    async fn update_author(
        &self,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<AuthorRecord, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            UPDATE authors
            SET last_name = $2, first_name = $3
            WHERE id = $1
            RETURNING id, last_name, first_name
            "#,
        )
        .bind(id)
        .bind(&draft.last_name)
        .bind(&draft.first_name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(AuthorRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_author(&self, id: AuthorId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
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
