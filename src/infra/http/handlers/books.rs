//! Book handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::application::auth::Viewer;
use crate::application::catalog::BookInput;
use crate::domain::roles::Role;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{BookRequest, ListQuery};
use crate::infra::http::state::HttpState;

use super::{
    accept_header, created_response, json_response, json_rejection, path_id, query_rejection,
};

pub async fn list_books(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(query_rejection)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let body = state
        .catalog
        .list_books(&ctx, query.page, query.limit)
        .await?;
    Ok(json_response(StatusCode::OK, body))
}

pub async fn get_book(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = path_id(path)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let body = state.catalog.get_book(&ctx, id).await?;
    Ok(json_response(StatusCode::OK, body))
}

pub async fn create_book(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    viewer.require(Role::Admin)?;
    let Json(payload) = payload.map_err(json_rejection)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let created = state.catalog.create_book(&ctx, payload.into()).await?;
    Ok(created_response(created))
}

pub async fn update_book(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    viewer.require(Role::Admin)?;
    let id = path_id(path)?;
    let Json(payload) = payload.map_err(json_rejection)?;

    let input = BookInput::from(payload);
    state.catalog.update_book(&viewer, id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_book(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    viewer.require(Role::Admin)?;
    let id = path_id(path)?;

    state.catalog.delete_book(&viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
