//! Author handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::application::auth::Viewer;
use crate::application::catalog::AuthorInput;
use crate::domain::roles::Role;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{AuthorRequest, ListQuery};
use crate::infra::http::state::HttpState;

use super::{
    accept_header, created_response, json_response, json_rejection, path_id, query_rejection,
};

pub async fn list_authors(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(query_rejection)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let body = state
        .catalog
        .list_authors(&ctx, query.page, query.limit)
        .await?;
    Ok(json_response(StatusCode::OK, body))
}

pub async fn get_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = path_id(path)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let body = state.catalog.get_author(&ctx, id).await?;
    Ok(json_response(StatusCode::OK, body))
}

pub async fn create_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    viewer.require(Role::Admin)?;
    let Json(payload) = payload.map_err(json_rejection)?;
    let ctx = state.catalog.read_context(accept_header(&headers), viewer);

    let created = state.catalog.create_author(&ctx, payload.into()).await?;
    Ok(created_response(created))
}

pub async fn update_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    viewer.require(Role::Admin)?;
    let id = path_id(path)?;
    let Json(payload) = payload.map_err(json_rejection)?;

    let input = AuthorInput::from(payload);
    state.catalog.update_author(&viewer, id, input.draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_author(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    viewer.require(Role::Admin)?;
    let id = path_id(path)?;

    state.catalog.delete_author(&viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
