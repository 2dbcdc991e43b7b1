mod blob;
mod collection;
mod factory;
mod filter;
mod provider;
mod query;
mod schema;
mod sqlite;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use blob::SqliteBlobStore;
pub use collection::SqliteCollection;
pub use factory::{SqliteFactory, StoreConfig};
pub use filter::{Filter, IndexKey, IndexKind, Sort, index_name};
pub use provider::StoreProvider;
pub use sqlite::SqliteStore;

use crate::error::{Error, Result};
use crate::types::Blob;

/// A stored record: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Field holding a record's id. Assigned on insert when missing.
pub const ID_FIELD: &str = "id";

/// Operations over one named collection of records.
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>>;
    /// `limit == 0` means unbounded.
    fn find_many(
        &self,
        filter: &Filter,
        sort: &[Sort],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>>;

    fn insert_one(&self, doc: Document) -> Result<String>;
    fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<String>>;

    /// Merges `patch` into the first match. Returns whether it changed.
    fn update_one(&self, filter: &Filter, patch: Document) -> Result<bool>;
    fn update_many(&self, filter: &Filter, patch: Document) -> Result<u64>;

    fn delete_one(&self, filter: &Filter) -> Result<bool>;
    fn delete_many(&self, filter: &Filter) -> Result<u64>;

    fn count_documents(&self, filter: &Filter) -> Result<u64>;

    fn create_index(&self, keys: &[IndexKey], unique: bool) -> Result<String>;
    fn drop_index(&self, name: &str) -> Result<()>;
    fn list_indexes(&self) -> Result<Vec<String>>;
}

/// Structured-document storage with an explicit connection lifecycle.
pub trait Store: Send + Sync {
    /// Opens the connection. A no-op when already connected.
    fn connect(&self) -> Result<()>;
    /// Releases the connection. A no-op when not connected.
    fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;
    /// Connected and answering queries.
    fn is_alive(&self) -> bool;
    fn get_collection(&self, name: &str) -> Result<Box<dyn Collection>>;
}

/// Binary payloads addressed by generated id.
pub trait BlobStore: Send + Sync {
    fn store(&self, data: &[u8], filename: &str, content_type: &str) -> Result<String>;
    /// Fails with `NotFound` for unknown ids.
    fn retrieve(&self, id: &str) -> Result<Blob>;
    /// Returns false when nothing was stored under `id`.
    fn delete(&self, id: &str) -> Result<bool>;
}

/// Builds store and blob-store handles bound to one connection target.
pub trait StoreFactory: Send + Sync {
    fn create_store(&self) -> Result<Arc<dyn Store>>;
    fn create_blob_store(&self) -> Result<Arc<dyn BlobStore>>;
    /// Disconnects the live store, if any.
    fn shutdown(&self) -> Result<()>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidQuery("record must serialize to an object".to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
