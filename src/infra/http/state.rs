use std::sync::Arc;

use crate::application::auth::Authenticator;
use crate::application::catalog::CatalogService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct HttpState {
    pub catalog: CatalogService,
    pub authenticator: Arc<Authenticator>,
    /// Absent when the catalog runs on non-Postgres repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}
