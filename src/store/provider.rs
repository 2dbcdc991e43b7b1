use std::sync::{Arc, RwLock};

use super::factory::{SqliteFactory, StoreConfig};
use super::{BlobStore, Store, StoreFactory};
use crate::error::{Error, Result};

/// Owns the process's store factory.
///
/// Constructed once at startup and passed to request handling through
/// `AppState`. `initialize` is a no-op once a factory is installed, except in
/// test mode where every `initialize` starts from a fresh factory.
pub struct StoreProvider {
    factory: RwLock<Option<Arc<dyn StoreFactory>>>,
    test_mode: bool,
}

impl Default for StoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factory: RwLock::new(None),
            test_mode: false,
        }
    }

    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            factory: RwLock::new(None),
            test_mode: true,
        }
    }

    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.factory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Installs a SQLite factory for `config`.
    pub fn initialize(&self, config: StoreConfig) {
        self.initialize_with(move || Arc::new(SqliteFactory::new(config)));
    }

    /// Installs the factory produced by `build`, which only runs when no
    /// factory is installed.
    pub fn initialize_with<F>(&self, build: F)
    where
        F: FnOnce() -> Arc<dyn StoreFactory>,
    {
        if self.test_mode {
            self.reset();
        }

        let mut factory = self.factory.write().unwrap_or_else(|e| e.into_inner());
        if factory.is_none() {
            *factory = Some(build());
            tracing::debug!("Store provider initialized");
        }
    }

    pub fn get_factory(&self) -> Result<Arc<dyn StoreFactory>> {
        self.factory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(Error::NotInitialized)
    }

    pub fn get_store(&self) -> Result<Arc<dyn Store>> {
        self.get_factory()?.create_store()
    }

    pub fn get_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        self.get_factory()?.create_blob_store()
    }

    /// Disconnects the live store and forgets the factory. Disconnect
    /// failures are logged and otherwise ignored.
    pub fn reset(&self) {
        let factory = self
            .factory
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(factory) = factory {
            if let Err(e) = factory.shutdown() {
                tracing::warn!("Ignoring store shutdown failure during reset: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use serde_json::Map;

    struct FailingShutdown;

    impl StoreFactory for FailingShutdown {
        fn create_store(&self) -> Result<Arc<dyn Store>> {
            Err(Error::NotConnected)
        }

        fn create_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
            Err(Error::NotConnected)
        }

        fn shutdown(&self) -> Result<()> {
            Err(Error::Config("boom".to_string()))
        }
    }

    #[test]
    fn test_get_before_initialize_fails() {
        let provider = StoreProvider::new();
        assert!(matches!(provider.get_factory(), Err(Error::NotInitialized)));
        assert!(matches!(provider.get_store(), Err(Error::NotInitialized)));
        assert!(matches!(provider.get_blob_store(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let provider = StoreProvider::new();
        provider.initialize(StoreConfig::in_memory());
        provider
            .get_store()
            .unwrap()
            .get_collection("things")
            .unwrap()
            .insert_one(Map::new())
            .unwrap();

        // The second call keeps the existing factory and its live database.
        provider.initialize(StoreConfig::in_memory());
        let count = provider
            .get_store()
            .unwrap()
            .get_collection("things")
            .unwrap()
            .count_documents(&Filter::all())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_test_mode_initialize_starts_fresh() {
        let provider = StoreProvider::for_tests();
        provider.initialize(StoreConfig::in_memory());
        provider
            .get_store()
            .unwrap()
            .get_collection("things")
            .unwrap()
            .insert_one(Map::new())
            .unwrap();

        provider.initialize(StoreConfig::in_memory());
        let count = provider
            .get_store()
            .unwrap()
            .get_collection("things")
            .unwrap()
            .count_documents(&Filter::all())
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reset_clears_factory() {
        let provider = StoreProvider::new();
        provider.initialize(StoreConfig::in_memory());
        let store = provider.get_store().unwrap();

        provider.reset();

        assert!(!store.is_connected());
        assert!(matches!(provider.get_factory(), Err(Error::NotInitialized)));
        assert!(matches!(provider.get_store(), Err(Error::NotInitialized)));

        provider.initialize(StoreConfig::in_memory());
        assert!(provider.get_store().is_ok());
    }

    #[test]
    fn test_reset_swallows_shutdown_errors() {
        let provider = StoreProvider::new();
        provider.initialize_with(|| Arc::new(FailingShutdown));
        provider.reset();
        assert!(!provider.is_initialized());
        provider.reset();
    }
}
