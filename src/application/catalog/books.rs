use bytes::Bytes;
use serde_json::Value;
use tracing::{info, instrument};

use super::{CatalogError, CatalogService, ComputeError, Created, ReadContext, encode, not_found_or};
use crate::application::auth::Viewer;
use crate::application::links::Resource;
use crate::application::projection::{BOOK_FIELDS, Projection, ProjectionContext, ViewGroup, project};
use crate::application::repos::{CreateBookParams, UpdateBookParams};
use crate::cache::policy::guarded_write;
use crate::cache::{WriteOperation, operations, tags};
use crate::domain::entities::{AuthorId, BookDraft, BookId, BookWithAuthor};
use crate::domain::error::DomainError;
use crate::domain::roles::Role;
use crate::domain::validation::validate_book;

const ENTITY: &str = "book";

/// Client-submitted book fields plus the referenced author.
///
/// On update a missing `comment` keeps the stored one, while a missing
/// `author_id` detaches the author.
#[derive(Debug, Clone, Default)]
pub struct BookInput {
    pub draft: BookDraft,
    pub author_id: Option<AuthorId>,
}

impl CatalogService {
    #[instrument(skip(self, ctx), fields(version = %ctx.version))]
    pub async fn list_books(
        &self,
        ctx: &ReadContext,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Bytes, CatalogError> {
        let page = self.page_request(page, limit)?;
        let key = self.listing_key(operations::GET_ALL_BOOKS, page, ctx);

        let payload = self
            .cache
            .get_or_compute(&key, &[tags::BOOKS], || async {
                let books = self.books.list_books(page).await?;
                let items = books
                    .iter()
                    .map(|book| self.project_book(book, ctx).map(Value::Object))
                    .collect::<Result<Vec<_>, _>>()?;
                encode(&Value::Array(items))
            })
            .await?;
        Ok(payload)
    }

    pub async fn get_book(&self, ctx: &ReadContext, id: BookId) -> Result<Bytes, CatalogError> {
        let book = self
            .books
            .find_book(id)
            .await
            .map_err(ComputeError::from)?
            .ok_or(DomainError::not_found(ENTITY))?;
        let projection = self.project_book(&book, ctx)?;
        Ok(encode(&Value::Object(projection))?)
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn create_book(
        &self,
        ctx: &ReadContext,
        input: BookInput,
    ) -> Result<Created, CatalogError> {
        ctx.viewer.require(Role::Admin)?;
        validate_book(&input.draft)?;

        let params = CreateBookParams {
            draft: input.draft,
            author_id: input.author_id,
        };
        let record = guarded_write(&self.cache, WriteOperation::CreateBook, || {
            self.books.create_book(params)
        })
        .await?;
        info!(book_id = record.id, author_id = ?record.author_id, "book created");

        let book = self
            .books
            .find_book(record.id)
            .await?
            .ok_or(DomainError::not_found(ENTITY))?;
        let projection = self.project_book(&book, ctx)?;

        Ok(Created {
            id: record.id,
            location: self.settings.links.detail(Resource::Book, record.id),
            body: encode(&Value::Object(projection))?,
        })
    }

    #[instrument(skip(self, viewer, input))]
    pub async fn update_book(
        &self,
        viewer: &Viewer,
        id: BookId,
        input: BookInput,
    ) -> Result<(), CatalogError> {
        viewer.require(Role::Admin)?;
        validate_book(&input.draft)?;

        let params = UpdateBookParams {
            id,
            title: input.draft.title,
            cover_text: input.draft.cover_text,
            comment: input.draft.comment,
            author_id: input.author_id,
        };
        guarded_write(&self.cache, WriteOperation::UpdateBook, || {
            self.books.update_book(params)
        })
        .await
        .map_err(not_found_or(ENTITY))?;
        info!(book_id = id, "book updated");
        Ok(())
    }

    #[instrument(skip(self, viewer))]
    pub async fn delete_book(&self, viewer: &Viewer, id: BookId) -> Result<(), CatalogError> {
        viewer.require(Role::Admin)?;

        guarded_write(&self.cache, WriteOperation::DeleteBook, || {
            self.books.delete_book(id)
        })
        .await
        .map_err(not_found_or(ENTITY))?;
        info!(book_id = id, "book deleted");
        Ok(())
    }

    fn project_book(
        &self,
        book: &BookWithAuthor,
        ctx: &ReadContext,
    ) -> Result<Projection, ComputeError> {
        let projection_ctx = ProjectionContext::new(&ctx.version, ViewGroup::GetBooks);
        let mut projection = project(book, BOOK_FIELDS, &projection_ctx)?;
        self.settings.links.attach(
            &mut projection,
            Resource::Book,
            book.book.id,
            ctx.viewer.is_admin(),
        );
        Ok(projection)
    }
}
