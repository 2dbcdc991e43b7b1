//! Entry creation from an already classified request payload.

use serde::Deserialize;

use crate::error::Result;
use crate::store::{BlobStore, Store};
use crate::types::{Entry, Index};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const FALLBACK_FILENAME: &str = "upload";

/// Keywords as sent by clients: a list, or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeywordsInput {
    List(Vec<String>),
    Csv(String),
}

impl Default for KeywordsInput {
    fn default() -> Self {
        KeywordsInput::List(Vec::new())
    }
}

impl KeywordsInput {
    /// Trimmed, non-empty tokens. Case is left alone.
    #[must_use]
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            KeywordsInput::List(items) => items
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            KeywordsInput::Csv(raw) => split_keywords(&raw),
        }
    }
}

#[must_use]
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps the last path component and only `[A-Za-z0-9._-]` from it.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let safe: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();
    let safe = safe.trim_start_matches('.');
    if safe.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        safe.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryInput {
    Text {
        content: String,
        keywords: Vec<String>,
    },
    File {
        data: Vec<u8>,
        filename: String,
        content_type: Option<String>,
        keywords: Vec<String>,
    },
}

/// Deletes a stored blob on drop unless the entry referencing it was saved.
struct PendingBlob<'a> {
    blobs: &'a dyn BlobStore,
    id: String,
    committed: bool,
}

impl Drop for PendingBlob<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.blobs.delete(&self.id) {
            Ok(_) => tracing::info!(blob_id = %self.id, "Removed orphaned blob"),
            Err(e) => tracing::warn!(blob_id = %self.id, "Failed to remove orphaned blob: {e}"),
        }
    }
}

/// Creates an entry in `index`.
///
/// File uploads are written to the blob store first. If the entry insert then
/// fails, the blob is removed best-effort and the insert error is returned.
pub fn ingest(store: &dyn Store, blobs: &dyn BlobStore, index: &Index, input: EntryInput) -> Result<Entry> {
    match input {
        EntryInput::Text { content, keywords } => {
            Entry::create_text(store, &index.id, &index.owner_id, &content, keywords)
        }
        EntryInput::File {
            data,
            filename,
            content_type,
            keywords,
        } => {
            let filename = sanitize_filename(&filename);
            let content_type = content_type
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

            let mut pending = PendingBlob {
                blobs,
                id: blobs.store(&data, &filename, &content_type)?,
                committed: false,
            };
            let entry = Entry::create_file(
                store,
                &index.id,
                &index.owner_id,
                &pending.id,
                &filename,
                &content_type,
                keywords,
            )?;
            pending.committed = true;

            tracing::info!(entry_id = %entry.id, bytes = data.len(), "Stored file entry");
            Ok(entry)
        }
    }
}
