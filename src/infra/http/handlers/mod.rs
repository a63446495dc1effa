//! Catalog API handlers organized by resource type.

mod authors;
mod books;

pub use authors::*;
pub use books::*;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::application::catalog::Created;

use super::error::ApiError;

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
}

fn json_response(status: StatusCode, body: Bytes) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn created_response(created: Created) -> Response {
    let mut response = json_response(StatusCode::CREATED, created.body);
    if let Ok(location) = HeaderValue::from_str(&created.location) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
}

/// Identifiers that do not parse name no resource.
fn path_id(path: Result<axum::extract::Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|axum::extract::Path(id)| id)
        .map_err(|rejection| ApiError::not_found(Some(rejection.body_text())))
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request("Invalid query string", Some(rejection.body_text()))
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Invalid JSON body", Some(rejection.body_text()))
}
