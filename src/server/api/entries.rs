use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::upload::parse_entry_input;
use crate::auth::RequireUser;
use crate::error::Error;
use crate::ingest::{DEFAULT_CONTENT_TYPE, ingest, sanitize_filename};
use crate::server::AppState;
use crate::server::dto::{EntryResponse, PageParams, SearchParams, SearchResponse};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::validation::required;
use crate::store::Store;
use crate::types::{Blob, Entry, EntryKind, Index};

fn owned_index(store: &dyn Store, id: &str, owner_id: &str) -> Result<Index, ApiError> {
    Index::find_for_owner(store, id, owner_id)
        .api_err("Failed to get index")?
        .or_not_found("Index not found")
}

fn entry_list(entries: Vec<Entry>) -> Json<Vec<EntryResponse>> {
    Json(entries.into_iter().map(EntryResponse::from).collect())
}

/// POST /api/indexes/{id}/entries - multipart file upload or JSON text
pub async fn create_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;
    let index = owned_index(store.as_ref(), &id, &auth.user.id)?;

    let input = parse_entry_input(request, &state).await?;
    let blobs = state.blob_store().api_err("Failed to open blob store")?;
    let entry = ingest(store.as_ref(), blobs.as_ref(), &index, input).api_err("Failed to create entry")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(EntryResponse::from(entry))))
}

/// GET /api/indexes/{id}/entries
pub async fn list_entries(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;
    owned_index(store.as_ref(), &id, &auth.user.id)?;
    let (skip, limit) = params.skip_limit();

    let entries = Entry::find_by_index(store.as_ref(), &id, &auth.user.id, skip, limit)
        .api_err("Failed to list entries")?;

    Ok::<_, ApiError>(entry_list(entries))
}

/// GET /api/indexes/{id}/entries/search?q= - `{"entries": [...]}`, best match first
pub async fn search_entries(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;
    owned_index(store.as_ref(), &id, &auth.user.id)?;

    let query = required(params.q, "Search query is required")?;
    let (skip, limit) = params.page.skip_limit();

    let entries = Entry::search(store.as_ref(), &id, &auth.user.id, &query, skip, limit)
        .api_err("Failed to search entries")?;

    Ok::<_, ApiError>(Json(SearchResponse {
        entries: entries.into_iter().map(EntryResponse::from).collect(),
    }))
}

/// GET /api/indexes/{id}/entries/{entry_id}
///
/// Text entries come back as JSON, file entries as a download.
pub async fn get_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, entry_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let store = state.store().api_err("Failed to open store")?;

    let entry = Entry::find_for_owner(store.as_ref(), &entry_id, &id, &auth.user.id)
        .api_err("Failed to get entry")?
        .or_not_found("Entry not found")?;

    if entry.kind != EntryKind::File {
        return Ok(Json(EntryResponse::from(entry)).into_response());
    }
    let blob_id = entry.blob_id.as_deref().or_not_found("File not found")?;

    let blobs = state.blob_store().api_err("Failed to open blob store")?;
    let blob = blobs.retrieve(blob_id).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("File not found"),
        e => ApiError::from(e),
    })?;

    Ok(download(blob))
}

fn download(blob: Blob) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&blob.content_type)
            .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    let safe_filename = sanitize_filename(&blob.filename);
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{safe_filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    } else {
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"upload\""),
        );
    }

    (StatusCode::OK, headers, blob.data).into_response()
}

/// DELETE /api/indexes/{id}/entries/{entry_id}
///
/// The record goes first; a blob left behind by a failed cleanup is only
/// logged.
pub async fn delete_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, entry_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;

    let entry = Entry::delete(store.as_ref(), &entry_id, &id, &auth.user.id)
        .api_err("Failed to delete entry")?
        .or_not_found("Entry not found")?;

    if let Some(blob_id) = entry.blob_id.as_deref() {
        let removed = state
            .blob_store()
            .and_then(|blobs| blobs.delete(blob_id));
        if let Err(e) = removed {
            tracing::warn!(blob_id, "Failed to delete blob of removed entry: {e}");
        }
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
