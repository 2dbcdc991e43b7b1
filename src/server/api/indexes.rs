use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{IndexRequest, IndexResponse, PageParams};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::validation::required;
use crate::types::Index;

const NAME_REQUIRED: &str = "Name is required";
const NAME_TAKEN: &str = "Index with this name already exists";

/// GET /api/indexes
pub async fn list_indexes(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;
    let (skip, limit) = params.skip_limit();

    let indexes = Index::find_by_owner(store.as_ref(), &auth.user.id, skip, limit)
        .api_err("Failed to list indexes")?;

    Ok::<_, ApiError>(Json(
        indexes.into_iter().map(IndexResponse::from).collect::<Vec<_>>(),
    ))
}

/// POST /api/indexes
pub async fn create_index(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = payload.map_err(|_| ApiError::bad_request(NAME_REQUIRED))?;
    let name = required(req.name, NAME_REQUIRED)?;
    let store = state.store().api_err("Failed to open store")?;

    let index = Index::create(
        store.as_ref(),
        &auth.user.id,
        &name,
        req.description.as_deref().unwrap_or_default(),
    )
    .api_err(NAME_TAKEN)?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(IndexResponse::from(index))))
}

/// GET /api/indexes/{id}
pub async fn get_index(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;

    let index = Index::find_for_owner(store.as_ref(), &id, &auth.user.id)
        .api_err("Failed to get index")?
        .or_not_found("Index not found")?;

    Ok::<_, ApiError>(Json(IndexResponse::from(index)))
}

/// PUT /api/indexes/{id} - rename; a missing description clears it
pub async fn update_index(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = payload.map_err(|_| ApiError::bad_request(NAME_REQUIRED))?;
    let name = required(req.name, NAME_REQUIRED)?;
    let store = state.store().api_err("Failed to open store")?;

    let mut index = Index::find_for_owner(store.as_ref(), &id, &auth.user.id)
        .api_err("Failed to get index")?
        .or_not_found("Index not found")?;

    index
        .update(
            store.as_ref(),
            &name,
            Some(req.description.as_deref().unwrap_or_default()),
        )
        .api_err(NAME_TAKEN)?;

    Ok::<_, ApiError>(Json(IndexResponse::from(index)))
}

/// DELETE /api/indexes/{id}
///
/// Only the index record goes; its entries stay where they are.
pub async fn delete_index(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;

    if !Index::delete(store.as_ref(), &id, &auth.user.id).api_err("Failed to delete index")? {
        return Err(ApiError::not_found("Index not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
