use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::BlobStore;
use super::sqlite::{SharedConnection, with_conn};
use crate::error::{Error, Result};
use crate::types::Blob;

/// Blob storage kept in the `_blobs` table of the document database.
pub struct SqliteBlobStore {
    conn: SharedConnection,
}

impl SqliteBlobStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

impl BlobStore for SqliteBlobStore {
    fn store(&self, data: &[u8], filename: &str, content_type: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        with_conn(&self.conn, |conn| {
            conn.execute(
                "INSERT INTO _blobs (id, filename, content_type, length, sha256, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    filename,
                    content_type,
                    data.len() as i64,
                    checksum(data),
                    data,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(Error::from_write)?;
            Ok(())
        })?;
        tracing::debug!("Stored blob {} ({} bytes)", id, data.len());
        Ok(id)
    }

    fn retrieve(&self, id: &str) -> Result<Blob> {
        let row = with_conn(&self.conn, |conn| {
            conn.query_row(
                "SELECT filename, content_type, sha256, data FROM _blobs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(Error::from)
        })?;

        let (filename, content_type, expected, data) = row.ok_or(Error::NotFound)?;
        if checksum(&data) != expected {
            return Err(Error::Corrupt(id.to_string()));
        }

        Ok(Blob {
            data,
            filename,
            content_type,
        })
    }

    fn delete(&self, id: &str) -> Result<bool> {
        with_conn(&self.conn, |conn| {
            let rows = conn.execute("DELETE FROM _blobs WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, Store, StoreConfig};

    fn blob_store() -> (SqliteStore, SqliteBlobStore) {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.connect().unwrap();
        let blobs = store.blob_store().unwrap();
        (store, blobs)
    }

    #[test]
    fn test_store_and_retrieve() {
        let (_store, blobs) = blob_store();

        let id = blobs
            .store(b"Test file content", "test.txt", "text/plain")
            .unwrap();
        let blob = blobs.retrieve(&id).unwrap();

        assert_eq!(blob.data, b"Test file content");
        assert_eq!(blob.filename, "test.txt");
        assert_eq!(blob.content_type, "text/plain");
    }

    #[test]
    fn test_empty_payload() {
        let (_store, blobs) = blob_store();
        let id = blobs.store(b"", "empty.bin", "application/octet-stream").unwrap();
        assert!(blobs.retrieve(&id).unwrap().data.is_empty());
    }

    #[test]
    fn test_delete() {
        let (_store, blobs) = blob_store();
        let id = blobs.store(b"123", "a.bin", "application/octet-stream").unwrap();

        assert!(blobs.delete(&id).unwrap());
        assert!(matches!(blobs.retrieve(&id), Err(Error::NotFound)));
        assert!(!blobs.delete(&id).unwrap());
    }

    #[test]
    fn test_unknown_id() {
        let (_store, blobs) = blob_store();
        assert!(matches!(blobs.retrieve("not-an-id"), Err(Error::NotFound)));
        assert!(!blobs.delete("not-an-id").unwrap());
    }

    #[test]
    fn test_checksum_mismatch() {
        let (_store, blobs) = blob_store();
        let id = blobs.store(b"original", "a.txt", "text/plain").unwrap();

        with_conn(&blobs.conn, |conn| {
            conn.execute(
                "UPDATE _blobs SET data = ?1 WHERE id = ?2",
                params![b"tampered".to_vec(), id],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(blobs.retrieve(&id), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_requires_connection() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        assert!(matches!(store.blob_store(), Err(Error::NotConnected)));

        store.connect().unwrap();
        let blobs = store.blob_store().unwrap();
        store.disconnect().unwrap();
        assert!(matches!(blobs.retrieve("x"), Err(Error::NotConnected)));
    }
}
