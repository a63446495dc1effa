//! Catalog use cases: cached, versioned listings and cache-aware writes.
//!
//! Listings are served from the [`TaggedCache`] as fully encoded JSON; detail
//! reads bypass it. Writes go through [`guarded_write`] so each operation
//! invalidates its tags at the point the policy prescribes.
//!
//! [`guarded_write`]: crate::cache::policy::guarded_write

mod authors;
mod books;

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::application::auth::{AuthError, Viewer};
use crate::application::links::LinkBuilder;
use crate::application::pagination::{PageLimits, PageRequest, PaginationError};
use crate::application::projection::FieldResolutionError;
use crate::application::repos::{AuthorsWriteRepo, BooksWriteRepo, RepoError};
use crate::application::versioning::{self, VersionTag};
use crate::cache::{TaggedCache, build_key};
use crate::domain::error::DomainError;

pub use authors::AuthorInput;
pub use books::BookInput;

/// Failure of a cached compute closure. Never stored in the cache.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Projection(#[from] FieldResolutionError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for CatalogError {
    fn from(error: RepoError) -> Self {
        Self::Repo(error)
    }
}

/// Per-request read parameters.
#[derive(Debug, Clone)]
pub struct ReadContext {
    pub version: VersionTag,
    pub viewer: Viewer,
}

/// A resource created by a write, ready to be returned with `201 Created`.
#[derive(Debug, Clone)]
pub struct Created {
    pub id: i64,
    pub location: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub default_version: VersionTag,
    pub page_limits: PageLimits,
    pub links: LinkBuilder,
}

#[derive(Clone)]
pub struct CatalogService {
    authors: Arc<dyn AuthorsWriteRepo>,
    books: Arc<dyn BooksWriteRepo>,
    cache: Arc<TaggedCache>,
    settings: Arc<CatalogSettings>,
}

impl CatalogService {
    pub fn new(
        authors: Arc<dyn AuthorsWriteRepo>,
        books: Arc<dyn BooksWriteRepo>,
        cache: Arc<TaggedCache>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            authors,
            books,
            cache,
            settings: Arc::new(settings),
        }
    }

    pub fn cache(&self) -> &Arc<TaggedCache> {
        &self.cache
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Build the read context for a request from its `Accept` header.
    pub fn read_context(&self, accept: Option<&str>, viewer: Viewer) -> ReadContext {
        ReadContext {
            version: versioning::resolve(accept, &self.settings.default_version),
            viewer,
        }
    }

    pub fn page_request(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<PageRequest, PaginationError> {
        PageRequest::parse(page, limit, self.settings.page_limits)
    }

    /// Key of a listing page. The version and admin view are only embedded
    /// when they differ from the anonymous default-version rendering.
    pub fn listing_key(&self, operation: &str, page: PageRequest, ctx: &ReadContext) -> String {
        let page_value = page.page().to_string();
        let limit_value = page.limit().to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("page", page_value.as_str()), ("limit", limit_value.as_str())];
        if ctx.version != self.settings.default_version {
            params.push(("version", ctx.version.as_str()));
        }
        if ctx.viewer.is_admin() {
            params.push(("view", "admin"));
        }
        build_key(operation, &params)
    }
}

fn encode(value: &Value) -> Result<Bytes, ComputeError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn not_found_or(entity: &'static str) -> impl FnOnce(RepoError) -> CatalogError {
    move |error| match error {
        RepoError::NotFound => DomainError::not_found(entity).into(),
        other => CatalogError::Repo(other),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::service;
    use super::*;
    use crate::application::auth::Principal;
    use crate::cache::operations;
    use crate::domain::roles::Role;

    fn admin() -> Viewer {
        Viewer(Some(Principal {
            name: "admin".to_string(),
            roles: vec![Role::Admin],
        }))
    }

    #[test]
    fn anonymous_default_version_key_is_bare() {
        let (service, _) = service();
        let ctx = service.read_context(None, Viewer::default());
        let page = service.page_request(None, None).unwrap();

        assert_eq!(
            service.listing_key(operations::GET_ALL_BOOKS, page, &ctx),
            "getAllBooks-1-3"
        );
    }

    #[test]
    fn version_and_admin_view_extend_key() {
        let (service, _) = service();
        let page = service.page_request(Some(2), Some(5)).unwrap();

        let versioned = service.read_context(Some("application/json; version=2.0"), Viewer::default());
        assert_eq!(
            service.listing_key(operations::GET_ALL_BOOKS, page, &versioned),
            "getAllBooks-2-5-2.0"
        );

        let admin_ctx = service.read_context(None, admin());
        assert_eq!(
            service.listing_key(operations::GET_ALL_AUTHORS, page, &admin_ctx),
            "getAllAuthors-2-5-admin"
        );
    }

    #[test]
    fn anonymous_version_token_cannot_reuse_admin_key() {
        let (service, _) = service();
        let page = service.page_request(None, None).unwrap();

        let admin_ctx = service.read_context(Some("application/json; version=3"), admin());
        let anonymous_ctx =
            service.read_context(Some("application/json; version=3-admin"), Viewer::default());

        let admin_key = service.listing_key(operations::GET_ALL_BOOKS, page, &admin_ctx);
        let anonymous_key = service.listing_key(operations::GET_ALL_BOOKS, page, &anonymous_ctx);
        assert_eq!(admin_key, "getAllBooks-1-3-3-admin");
        assert_ne!(admin_key, anonymous_key);
    }

    #[test]
    fn equivalent_version_spelling_shares_key() {
        let (service, _) = service();
        let page = service.page_request(None, None).unwrap();
        let ctx = service.read_context(Some("application/json; version=1"), Viewer::default());

        assert_eq!(
            service.listing_key(operations::GET_ALL_BOOKS, page, &ctx),
            "getAllBooks-1-3"
        );
    }
}
