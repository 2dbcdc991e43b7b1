pub const SCHEMA: &str = r#"
-- Catalog of secondary indexes created through the collection API
CREATE TABLE IF NOT EXISTS _indexes (
    collection TEXT NOT NULL,
    name TEXT NOT NULL,
    keys TEXT NOT NULL,               -- JSON array of [field, kind] pairs
    is_unique INTEGER NOT NULL DEFAULT 0,
    is_text INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (collection, name)
);

-- Binary payloads referenced by id from documents
CREATE TABLE IF NOT EXISTS _blobs (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    content_type TEXT NOT NULL,
    length INTEGER NOT NULL,
    sha256 TEXT NOT NULL,
    data BLOB NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
"#;

/// Table backing a single document collection. `seq` is the stable rowid the
/// full-text shadow table keys on.
pub fn collection_table(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{name}\" (
            seq INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            doc TEXT NOT NULL
        );"
    )
}
