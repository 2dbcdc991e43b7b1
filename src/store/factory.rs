use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::sqlite::SqliteStore;
use super::{BlobStore, Store, StoreFactory};
use crate::error::Result;

const IN_MEMORY_URI: &str = ":memory:";

/// Connection target: a directory (or `:memory:`) plus a database name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    pub database_name: String,
}

impl StoreConfig {
    #[must_use]
    pub fn new(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: database_name.into(),
        }
    }

    /// A private in-memory database, discarded on disconnect.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_URI, "memory")
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.uri == IN_MEMORY_URI
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.uri).join(format!("{}.db", self.database_name))
    }

    pub(crate) fn describe(&self) -> String {
        if self.is_in_memory() {
            "in-memory database".to_string()
        } else {
            self.db_path().display().to_string()
        }
    }
}

/// Hands out the process's single live `SqliteStore`, connecting lazily and
/// replacing it only when the current connection is found dead.
pub struct SqliteFactory {
    config: StoreConfig,
    live: Mutex<Option<Arc<SqliteStore>>>,
}

impl SqliteFactory {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            live: Mutex::new(None),
        }
    }

    fn live_store(&self) -> Result<Arc<SqliteStore>> {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(store) = live.as_ref() {
            if store.is_alive() {
                return Ok(Arc::clone(store));
            }
            tracing::warn!("Store connection lost, reconnecting to {}", self.config.describe());
            if let Err(e) = store.disconnect() {
                tracing::warn!("Failed to close dead connection: {e}");
            }
        }

        let store = Arc::new(SqliteStore::new(self.config.clone()));
        store.connect()?;
        tracing::info!("Connected to {}", self.config.describe());
        *live = Some(Arc::clone(&store));
        Ok(store)
    }
}

impl StoreFactory for SqliteFactory {
    fn create_store(&self) -> Result<Arc<dyn Store>> {
        let store: Arc<dyn Store> = self.live_store()?;
        Ok(store)
    }

    fn create_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        let store = self.live_store()?;
        Ok(Arc::new(store.blob_store()?))
    }

    fn shutdown(&self) -> Result<()> {
        let store = self.live.lock().unwrap_or_else(|e| e.into_inner()).take();
        match store {
            Some(store) => store.disconnect(),
            None => Ok(()),
        }
    }
}
