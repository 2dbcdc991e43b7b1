use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use super::blob::SqliteBlobStore;
use super::collection::SqliteCollection;
use super::factory::StoreConfig;
use super::query::validate_collection_name;
use super::schema::{SCHEMA, collection_table};
use super::{Collection, Store};
use crate::error::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection slot shared by the store and every handle it hands out.
/// `None` means disconnected.
pub(crate) type SharedConnection = Arc<Mutex<Option<Connection>>>;

pub(crate) fn lock(conn: &SharedConnection) -> MutexGuard<'_, Option<Connection>> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

/// Runs `f` against the live connection, failing with `NotConnected` otherwise.
pub(crate) fn with_conn<T>(
    conn: &SharedConnection,
    f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
    let mut guard = lock(conn);
    let conn = guard.as_mut().ok_or(Error::NotConnected)?;
    f(conn)
}

pub struct SqliteStore {
    config: StoreConfig,
    conn: SharedConnection,
}

impl SqliteStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open(&self) -> Result<Connection> {
        let conn = if self.config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            std::fs::create_dir_all(&self.config.uri)?;
            let conn = Connection::open(self.config.db_path())?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn
        };

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Blob storage living in the same database as the documents.
    pub fn blob_store(&self) -> Result<SqliteBlobStore> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(SqliteBlobStore::new(Arc::clone(&self.conn)))
    }
}

impl Store for SqliteStore {
    fn connect(&self) -> Result<()> {
        let mut guard = lock(&self.conn);
        if guard.is_none() {
            *guard = Some(self.open()?);
            tracing::debug!("Connected to {}", self.config.describe());
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let conn = lock(&self.conn).take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| Error::from(e))?;
            tracing::debug!("Disconnected from {}", self.config.describe());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.conn).is_some()
    }

    fn is_alive(&self) -> bool {
        with_conn(&self.conn, |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(Error::from)
        })
        .is_ok()
    }

    fn get_collection(&self, name: &str) -> Result<Box<dyn Collection>> {
        validate_collection_name(name)?;
        with_conn(&self.conn, |conn| {
            conn.execute_batch(&collection_table(name))?;
            Ok(())
        })?;
        Ok(Box::new(SqliteCollection::new(
            Arc::clone(&self.conn),
            name.to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connect_creates_catalog_tables() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(StoreConfig::new(
            temp.path().to_string_lossy(),
            "test",
        ));
        store.connect().unwrap();
        assert!(temp.path().join("test.db").exists());

        let tables: Vec<String> = with_conn(&store.conn, |conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::from)
        })
        .unwrap();

        assert!(tables.contains(&"_indexes".to_string()));
        assert!(tables.contains(&"_blobs".to_string()));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.connect().unwrap();
        store
            .get_collection("things")
            .unwrap()
            .insert_one(serde_json::Map::new())
            .unwrap();

        // A second connect must keep the same in-memory database.
        store.connect().unwrap();
        let count = store
            .get_collection("things")
            .unwrap()
            .count_documents(&crate::store::Filter::all())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_get_collection_requires_connection() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        assert!(matches!(
            store.get_collection("users"),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_is_safe_when_not_connected() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.disconnect().unwrap();

        store.connect().unwrap();
        assert!(store.is_alive());
        store.disconnect().unwrap();
        store.disconnect().unwrap();
        assert!(!store.is_connected());
        assert!(!store.is_alive());
    }

    #[test]
    fn test_handles_fail_after_disconnect() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.connect().unwrap();
        let users = store.get_collection("users").unwrap();
        store.disconnect().unwrap();

        assert!(matches!(
            users.find_one(&crate::store::Filter::all()),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_invalid_collection_name() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.connect().unwrap();
        assert!(matches!(
            store.get_collection("users; DROP TABLE x"),
            Err(Error::InvalidQuery(_))
        ));
    }
}
