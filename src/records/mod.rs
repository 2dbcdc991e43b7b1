//! Persistence for the domain records.
//!
//! Every read that can reach another user's data takes the caller's id and
//! bakes it into the filter, so a guessed id never crosses owners.

mod entries;
mod indexes;
mod tokens;
mod users;

pub use entries::{ENTRY_TEXT_INDEX, normalize_keywords};
pub use indexes::MAX_INDEX_NAME_LEN;
pub use users::MIN_USERNAME_LEN;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::store::{
    Collection, Filter, IndexKey, Sort, Store, from_document, to_document,
};
use crate::types::Entry;

pub const USERS: &str = "users";
pub const INDEXES: &str = "indexes";
pub const ENTRIES: &str = "entries";
pub const TOKENS: &str = "tokens";

/// Creates the storage indexes the records rely on. Safe to re-run.
pub fn ensure_indexes(store: &dyn Store) -> Result<()> {
    store
        .get_collection(USERS)?
        .create_index(&[IndexKey::asc("username")], true)?;

    store
        .get_collection(INDEXES)?
        .create_index(&[IndexKey::asc("owner_id"), IndexKey::asc("name")], true)?;

    let entries = store.get_collection(ENTRIES)?;
    entries.create_index(&[IndexKey::asc("index_id"), IndexKey::desc("created_at")], false)?;
    entries.create_index(&[IndexKey::asc("owner_id"), IndexKey::asc("keywords")], false)?;
    Entry::ensure_text_index(entries.as_ref())?;

    let tokens = store.get_collection(TOKENS)?;
    tokens.create_index(&[IndexKey::asc("token_lookup")], true)?;
    tokens.create_index(&[IndexKey::asc("user_id")], false)?;

    tracing::info!("Storage indexes ready");
    Ok(())
}

fn insert<T: Serialize>(collection: &dyn Collection, record: &T) -> Result<()> {
    collection.insert_one(to_document(record)?)?;
    Ok(())
}

fn find_one<T: DeserializeOwned>(collection: &dyn Collection, filter: &Filter) -> Result<Option<T>> {
    collection.find_one(filter)?.map(from_document).transpose()
}

fn find_many<T: DeserializeOwned>(
    collection: &dyn Collection,
    filter: &Filter,
    sort: &[Sort],
    skip: usize,
    limit: usize,
) -> Result<Vec<T>> {
    collection
        .find_many(filter, sort, skip, limit)?
        .into_iter()
        .map(from_document)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_indexes_is_idempotent() {
        let store = test_support::store();
        ensure_indexes(&store).unwrap();

        assert_eq!(
            store.get_collection(ENTRIES).unwrap().list_indexes().unwrap(),
            vec![
                "index_id_1_created_at_-1",
                "owner_id_1_keywords_1",
                "content_text_keywords_text",
            ]
        );
        assert_eq!(
            store.get_collection(USERS).unwrap().list_indexes().unwrap(),
            vec!["username_1"]
        );
    }
}
