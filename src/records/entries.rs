use std::collections::BTreeMap;

use super::{ENTRIES, find_many, find_one, insert};
use crate::error::{Error, Result};
use crate::store::{Collection, Filter, IndexKey, Sort, Store};
use crate::types::{Entry, EntryKind, timestamp};

/// Name of the full-text index over entry content and keywords.
pub const ENTRY_TEXT_INDEX: &str = "content_text_keywords_text";

/// Trims and lower-cases keywords, dropping empty ones. Order is kept and
/// repeats are not collapsed.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn owned(id: &str, index_id: &str, owner_id: &str) -> Filter {
    Filter::and([
        Filter::eq("id", id),
        Filter::eq("index_id", index_id),
        Filter::eq("owner_id", owner_id),
    ])
}

fn in_index(index_id: &str, owner_id: &str) -> Filter {
    Filter::and([Filter::eq("index_id", index_id), Filter::eq("owner_id", owner_id)])
}

impl Entry {
    /// Builds a text entry. Content is trimmed and must not end up empty.
    pub fn new_text<I, S>(index_id: &str, owner_id: &str, content: &str, keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("Content is required".to_string()));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            index_id: index_id.to_string(),
            owner_id: owner_id.to_string(),
            kind: EntryKind::Text,
            content: Some(content.to_string()),
            blob_id: None,
            metadata: None,
            keywords: normalize_keywords(keywords),
            created_at: timestamp::now(),
        })
    }

    /// Builds a file entry referencing an already stored blob.
    #[must_use]
    pub fn new_file<I, S>(
        index_id: &str,
        owner_id: &str,
        blob_id: &str,
        filename: &str,
        content_type: &str,
        keywords: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let metadata = BTreeMap::from([
            ("filename".to_string(), filename.to_string()),
            ("content_type".to_string(), content_type.to_string()),
        ]);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            index_id: index_id.to_string(),
            owner_id: owner_id.to_string(),
            kind: EntryKind::File,
            content: None,
            blob_id: Some(blob_id.to_string()),
            metadata: Some(metadata),
            keywords: normalize_keywords(keywords),
            created_at: timestamp::now(),
        }
    }

    pub fn create_text<I, S>(
        store: &dyn Store,
        index_id: &str,
        owner_id: &str,
        content: &str,
        keywords: I,
    ) -> Result<Entry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = Entry::new_text(index_id, owner_id, content, keywords)?;
        entry.insert(store)?;
        Ok(entry)
    }

    pub fn create_file<I, S>(
        store: &dyn Store,
        index_id: &str,
        owner_id: &str,
        blob_id: &str,
        filename: &str,
        content_type: &str,
        keywords: I,
    ) -> Result<Entry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = Entry::new_file(index_id, owner_id, blob_id, filename, content_type, keywords);
        entry.insert(store)?;
        Ok(entry)
    }

    fn insert(&self, store: &dyn Store) -> Result<()> {
        insert(store.get_collection(ENTRIES)?.as_ref(), self)?;
        tracing::debug!(entry_id = %self.id, kind = self.kind.as_str(), "Created entry");
        Ok(())
    }

    /// The index's entries, newest first.
    pub fn find_by_index(
        store: &dyn Store,
        index_id: &str,
        owner_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        find_many(
            store.get_collection(ENTRIES)?.as_ref(),
            &in_index(index_id, owner_id),
            &[Sort::desc("created_at")],
            skip,
            limit,
        )
    }

    pub fn find_for_owner(store: &dyn Store, id: &str, index_id: &str, owner_id: &str) -> Result<Option<Entry>> {
        find_one(store.get_collection(ENTRIES)?.as_ref(), &owned(id, index_id, owner_id))
    }

    /// Removes the entry and returns it, so the caller can release its blob.
    pub fn delete(store: &dyn Store, id: &str, index_id: &str, owner_id: &str) -> Result<Option<Entry>> {
        let collection = store.get_collection(ENTRIES)?;
        let filter = owned(id, index_id, owner_id);

        let Some(entry) = find_one::<Entry>(collection.as_ref(), &filter)? else {
            return Ok(None);
        };
        if !collection.delete_one(&filter)? {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    pub fn ensure_text_index(collection: &dyn Collection) -> Result<String> {
        collection.create_index(&[IndexKey::text("content"), IndexKey::text("keywords")], false)
    }

    /// Entries in the index whose text matches `query`, or whose keywords
    /// contain it verbatim. Best text matches come first, then newest.
    pub fn search(
        store: &dyn Store,
        index_id: &str,
        owner_id: &str,
        query: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("Search query is required".to_string()));
        }

        let collection = store.get_collection(ENTRIES)?;
        Entry::ensure_text_index(collection.as_ref())?;

        let filter = Filter::and([
            Filter::eq("index_id", index_id),
            Filter::eq("owner_id", owner_id),
            Filter::or([Filter::text(query), Filter::eq("keywords", query.to_lowercase())]),
        ]);
        find_many(
            collection.as_ref(),
            &filter,
            &[Sort::TextScore, Sort::desc("created_at")],
            skip,
            limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ENTRIES, test_support};
    use crate::store::{SqliteStore, StoreConfig, index_name};

    fn text(store: &SqliteStore, content: &str, keywords: &[&str]) -> Entry {
        Entry::create_text(store, "idx", "owner", content, keywords.iter().copied()).unwrap()
    }

    #[test]
    fn test_text_index_name_matches_keys() {
        assert_eq!(
            index_name(&[IndexKey::text("content"), IndexKey::text("keywords")]),
            ENTRY_TEXT_INDEX
        );
    }

    #[test]
    fn test_normalize_keywords() {
        assert_eq!(
            normalize_keywords([" Work ", "", "  ", "URGENT", "work"]),
            vec!["work", "urgent", "work"]
        );
    }

    #[test]
    fn test_entry_kind_invariant() {
        let entry = Entry::new_text("idx", "owner", "  hello  ", ["A"]).unwrap();
        assert_eq!(entry.kind, EntryKind::Text);
        assert_eq!(entry.content.as_deref(), Some("hello"));
        assert!(entry.blob_id.is_none());
        assert!(entry.metadata.is_none());
        assert_eq!(entry.keywords, vec!["a"]);

        let entry = Entry::new_file("idx", "owner", "blob-1", "a.pdf", "application/pdf", Vec::<String>::new());
        assert_eq!(entry.kind, EntryKind::File);
        assert!(entry.content.is_none());
        assert_eq!(entry.blob_id.as_deref(), Some("blob-1"));
        let metadata = entry.metadata.unwrap();
        assert_eq!(metadata["filename"], "a.pdf");
        assert_eq!(metadata["content_type"], "application/pdf");
    }

    #[test]
    fn test_new_text_requires_content() {
        let err = Entry::new_text("idx", "owner", "   ", ["a"]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_find_by_index_newest_first_and_scoped() {
        let store = test_support::store();
        text(&store, "first", &[]);
        text(&store, "second", &[]);
        Entry::create_text(&store, "idx", "intruder", "theirs", ["x"]).unwrap();
        Entry::create_text(&store, "other", "owner", "elsewhere", ["x"]).unwrap();

        let contents: Vec<_> = Entry::find_by_index(&store, "idx", "owner", 0, 0)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
    }

    #[test]
    fn test_find_and_delete_are_owner_scoped() {
        let store = test_support::store();
        let entry = text(&store, "mine", &[]);

        assert!(Entry::find_for_owner(&store, &entry.id, "idx", "intruder").unwrap().is_none());
        assert!(Entry::find_for_owner(&store, &entry.id, "other", "owner").unwrap().is_none());
        assert!(Entry::delete(&store, &entry.id, "idx", "intruder").unwrap().is_none());

        let found = Entry::find_for_owner(&store, &entry.id, "idx", "owner").unwrap().unwrap();
        assert_eq!(found, entry);

        let deleted = Entry::delete(&store, &entry.id, "idx", "owner").unwrap().unwrap();
        assert_eq!(deleted.id, entry.id);
        assert!(Entry::delete(&store, &entry.id, "idx", "owner").unwrap().is_none());
    }

    #[test]
    fn test_search_matches_keywords() {
        let store = test_support::store();
        let meeting = text(&store, "Notes from today", &["meeting", "important"]);
        text(&store, "Groceries", &["shopping"]);

        let results = Entry::search(&store, "idx", "owner", "meeting", 0, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, meeting.id);
        assert_eq!(results[0].keywords, vec!["meeting", "important"]);
    }

    #[test]
    fn test_search_ranks_relevance_before_recency() {
        let store = test_support::store();
        let strong = text(&store, "rust rust rust compiler", &[]);
        let weak = text(&store, "a long note that mentions rust once among many other words here", &[]);
        text(&store, "unrelated", &[]);

        let ids: Vec<_> = Entry::search(&store, "idx", "owner", "Rust", 0, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![strong.id, weak.id]);
    }

    #[test]
    fn test_search_is_owner_scoped() {
        let store = test_support::store();
        Entry::create_text(&store, "idx", "intruder", "secret plans", ["secret"]).unwrap();

        let results = Entry::search(&store, "idx", "owner", "secret", 0, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_creates_missing_text_index() {
        let store = SqliteStore::new(StoreConfig::in_memory());
        store.connect().unwrap();
        text(&store, "hello world", &[]);

        let results = Entry::search(&store, "idx", "owner", "hello", 0, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            store.get_collection(ENTRIES).unwrap().list_indexes().unwrap(),
            vec![ENTRY_TEXT_INDEX]
        );
    }

    #[test]
    fn test_search_requires_query() {
        let store = test_support::store();
        let err = Entry::search(&store, "idx", "owner", "  ", 0, 10).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
