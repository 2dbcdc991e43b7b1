use serde_json::{Map, Value};

use super::{INDEXES, find_many, find_one, insert};
use crate::error::{Error, Result};
use crate::store::{Filter, Sort, Store};
use crate::types::{Index, timestamp};

pub const MAX_INDEX_NAME_LEN: usize = 100;

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Index name is required".to_string()));
    }
    if name.chars().count() > MAX_INDEX_NAME_LEN {
        return Err(Error::Validation(format!(
            "Index name must be at most {MAX_INDEX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn owned(id: &str, owner_id: &str) -> Filter {
    Filter::and([Filter::eq("id", id), Filter::eq("owner_id", owner_id)])
}

impl Index {
    #[must_use]
    pub fn new(owner_id: &str, name: &str, description: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: timestamp::now(),
        }
    }

    pub fn create(store: &dyn Store, owner_id: &str, name: &str, description: &str) -> Result<Index> {
        let index = Index::new(owner_id, name, description);
        validate_name(&index.name)?;

        insert(store.get_collection(INDEXES)?.as_ref(), &index)?;
        tracing::info!(index_id = %index.id, name = %index.name, "Created index");
        Ok(index)
    }

    /// The owner's indexes, newest first.
    pub fn find_by_owner(store: &dyn Store, owner_id: &str, skip: usize, limit: usize) -> Result<Vec<Index>> {
        find_many(
            store.get_collection(INDEXES)?.as_ref(),
            &Filter::eq("owner_id", owner_id),
            &[Sort::desc("created_at")],
            skip,
            limit,
        )
    }

    /// Looks up `id`, treating another owner's index as absent.
    pub fn find_for_owner(store: &dyn Store, id: &str, owner_id: &str) -> Result<Option<Index>> {
        find_one(store.get_collection(INDEXES)?.as_ref(), &owned(id, owner_id))
    }

    /// Renames the index and, when given, replaces its description.
    ///
    /// Colliding with another of the owner's index names fails with
    /// `Duplicate`. The pre-check only yields the friendlier early exit; the
    /// unique index decides races.
    pub fn update(&mut self, store: &dyn Store, name: &str, description: Option<&str>) -> Result<()> {
        validate_name(name)?;

        let collection = store.get_collection(INDEXES)?;
        let clash = Filter::and([
            Filter::eq("owner_id", self.owner_id.as_str()),
            Filter::eq("name", name),
            Filter::ne("id", self.id.as_str()),
        ]);
        if collection.count_documents(&clash)? > 0 {
            return Err(Error::Duplicate);
        }

        let mut patch = Map::new();
        patch.insert("name".to_string(), Value::from(name));
        if let Some(description) = description {
            patch.insert("description".to_string(), Value::from(description));
        }
        collection.update_one(&owned(&self.id, &self.owner_id), patch)?;

        self.name = name.to_string();
        if let Some(description) = description {
            self.description = description.to_string();
        }
        Ok(())
    }

    /// Removes the index record only. Its entries are left in place.
    pub fn delete(store: &dyn Store, id: &str, owner_id: &str) -> Result<bool> {
        let deleted = store.get_collection(INDEXES)?.delete_one(&owned(id, owner_id))?;
        if deleted {
            tracing::info!(index_id = %id, "Deleted index");
        }
        Ok(deleted)
    }
}
