mod entries;
mod indexes;
mod upload;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Indexes
        .route("/indexes", get(indexes::list_indexes).post(indexes::create_index))
        .route(
            "/indexes/{id}",
            get(indexes::get_index)
                .put(indexes::update_index)
                .delete(indexes::delete_index),
        )
        // Entries
        .route(
            "/indexes/{id}/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route("/indexes/{id}/entries/search", get(entries::search_entries))
        .route(
            "/indexes/{id}/entries/{entry_id}",
            get(entries::get_entry).delete(entries::delete_entry),
        )
}
