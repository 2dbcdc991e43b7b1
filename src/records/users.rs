use super::{USERS, find_one, insert};
use crate::error::{Error, Result};
use crate::store::{Filter, Store};
use crate::types::{User, timestamp};

pub const MIN_USERNAME_LEN: usize = 3;

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl User {
    #[must_use]
    pub fn new(username: &str, password_hash: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: normalize_username(username),
            password_hash: password_hash.into(),
            created_at: timestamp::now(),
        }
    }

    /// Inserts a new user. A taken username surfaces as `Duplicate` from the
    /// unique index.
    pub fn create(store: &dyn Store, username: &str, password_hash: &str) -> Result<User> {
        let user = User::new(username, password_hash);
        if user.username.chars().count() < MIN_USERNAME_LEN {
            return Err(Error::Validation(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }

        insert(store.get_collection(USERS)?.as_ref(), &user)?;
        tracing::info!(username = %user.username, "Created user");
        Ok(user)
    }

    pub fn find_by_username(store: &dyn Store, username: &str) -> Result<Option<User>> {
        let filter = Filter::eq("username", normalize_username(username));
        find_one(store.get_collection(USERS)?.as_ref(), &filter)
    }

    pub fn find_by_id(store: &dyn Store, id: &str) -> Result<Option<User>> {
        find_one(store.get_collection(USERS)?.as_ref(), &Filter::eq("id", id))
    }
}
