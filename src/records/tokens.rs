use super::{TOKENS, find_one, insert};
use crate::error::Result;
use crate::store::{Filter, Store};
use crate::types::Token;

impl Token {
    pub fn insert(&self, store: &dyn Store) -> Result<()> {
        insert(store.get_collection(TOKENS)?.as_ref(), self)
    }

    pub fn find_by_lookup(store: &dyn Store, lookup: &str) -> Result<Option<Token>> {
        find_one(
            store.get_collection(TOKENS)?.as_ref(),
            &Filter::eq("token_lookup", lookup),
        )
    }

    pub fn delete(store: &dyn Store, id: &str) -> Result<bool> {
        store.get_collection(TOKENS)?.delete_one(&Filter::eq("id", id))
    }
}
