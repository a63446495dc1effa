//! HTTP surface of the catalog API.

pub mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use state::HttpState;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::error::ErrorReport;

use middleware::{authenticate, log_responses, set_request_context};

/// Build the application router with request-id, logging and auth layers.
pub fn build_router(state: HttpState) -> Router {
    let api = Router::new()
        .route(
            "/api/authors",
            get(handlers::list_authors).post(handlers::create_author),
        )
        .route(
            "/api/authors/{id}",
            get(handlers::get_author)
                .put(handlers::update_author)
                .delete(handlers::delete_author),
        )
        .route(
            "/api/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/api/books/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(db_health))
        .merge(api)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn db_health(State(state): State<HttpState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
