use bytes::Bytes;
use serde_json::Value;
use tracing::{info, instrument};

use super::{CatalogError, CatalogService, ComputeError, Created, ReadContext, encode, not_found_or};
use crate::application::auth::Viewer;
use crate::application::links::Resource;
use crate::application::projection::{
    AUTHOR_FIELDS, Projection, ProjectionContext, ViewGroup, project,
};
use crate::application::repos::CreateAuthorParams;
use crate::cache::policy::guarded_write;
use crate::cache::{WriteOperation, operations, tags};
use crate::domain::entities::{AuthorDraft, AuthorId, AuthorWithBooks, BookId};
use crate::domain::error::DomainError;
use crate::domain::roles::Role;
use crate::domain::validation::validate_author;

const ENTITY: &str = "author";

/// Client-submitted author fields plus an optional book to attach on creation.
#[derive(Debug, Clone, Default)]
pub struct AuthorInput {
    pub draft: AuthorDraft,
    pub book_id: Option<BookId>,
}

impl CatalogService {
    #[instrument(skip(self, ctx), fields(version = %ctx.version))]
    pub async fn list_authors(
        &self,
        ctx: &ReadContext,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Bytes, CatalogError> {
        let page = self.page_request(page, limit)?;
        let key = self.listing_key(operations::GET_ALL_AUTHORS, page, ctx);

        let payload = self
            .cache
            .get_or_compute(&key, &[tags::AUTHORS], || async {
                let authors = self.authors.list_authors(page).await?;
                let items = authors
                    .iter()
                    .map(|author| self.project_author(author, ctx).map(Value::Object))
                    .collect::<Result<Vec<_>, _>>()?;
                encode(&Value::Array(items))
            })
            .await?;
        Ok(payload)
    }

    pub async fn get_author(&self, ctx: &ReadContext, id: AuthorId) -> Result<Bytes, CatalogError> {
        let author = self
            .authors
            .find_author(id)
            .await
            .map_err(ComputeError::from)?
            .ok_or(DomainError::not_found(ENTITY))?;
        let projection = self.project_author(&author, ctx)?;
        Ok(encode(&Value::Object(projection))?)
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn create_author(
        &self,
        ctx: &ReadContext,
        input: AuthorInput,
    ) -> Result<Created, CatalogError> {
        ctx.viewer.require(Role::Admin)?;
        validate_author(&input.draft)?;

        let params = CreateAuthorParams {
            draft: input.draft,
            book_id: input.book_id,
        };
        let record = guarded_write(&self.cache, WriteOperation::CreateAuthor, || {
            self.authors.create_author(params)
        })
        .await?;
        info!(author_id = record.id, "author created");

        let author = self
            .authors
            .find_author(record.id)
            .await?
            .ok_or(DomainError::not_found(ENTITY))?;
        let projection = self.project_author(&author, ctx)?;

        Ok(Created {
            id: record.id,
            location: self.settings.links.detail(Resource::Author, record.id),
            body: encode(&Value::Object(projection))?,
        })
    }

    #[instrument(skip(self, viewer, draft))]
    pub async fn update_author(
        &self,
        viewer: &Viewer,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<(), CatalogError> {
        viewer.require(Role::Admin)?;
        validate_author(&draft)?;

        guarded_write(&self.cache, WriteOperation::UpdateAuthor, || {
            self.authors.update_author(id, draft)
        })
        .await
        .map_err(not_found_or(ENTITY))?;
        info!(author_id = id, "author updated");
        Ok(())
    }

    #[instrument(skip(self, viewer))]
    pub async fn delete_author(&self, viewer: &Viewer, id: AuthorId) -> Result<(), CatalogError> {
        viewer.require(Role::Admin)?;

        guarded_write(&self.cache, WriteOperation::DeleteAuthor, || {
            self.authors.delete_author(id)
        })
        .await
        .map_err(not_found_or(ENTITY))?;
        info!(author_id = id, "author deleted");
        Ok(())
    }

    fn project_author(
        &self,
        author: &AuthorWithBooks,
        ctx: &ReadContext,
    ) -> Result<Projection, ComputeError> {
        let projection_ctx = ProjectionContext::new(&ctx.version, ViewGroup::GetAuthors);
        let mut projection = project(author, AUTHOR_FIELDS, &projection_ctx)?;
        self.settings.links.attach(
            &mut projection,
            Resource::Author,
            author.author.id,
            ctx.viewer.is_admin(),
        );
        Ok(projection)
    }
}
