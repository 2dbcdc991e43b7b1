use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ingest::KeywordsInput;
use crate::types::{Entry, Index, User, timestamp};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<Index> for IndexResponse {
    fn from(index: Index) -> Self {
        Self {
            id: index.id,
            name: index.name,
            description: index.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTextEntryRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub keywords: Option<KeywordsInput>,
}

/// Entry as exposed to clients. Absent fields are sent as `null`.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: Option<String>,
    pub file_id: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub keywords: Vec<String>,
    pub created_at: String,
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind.as_str(),
            content: entry.content,
            file_id: entry.blob_id,
            metadata: entry.metadata,
            keywords: entry.keywords,
            created_at: timestamp::format(&entry.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub entries: Vec<EntryResponse>,
}

/// `page`/`per_page` query parameters. Unparseable values fall back to the
/// defaults rather than failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PageParams {
    /// Returns (skip, limit).
    #[must_use]
    pub fn skip_limit(&self) -> (usize, usize) {
        let page = parse_or(self.page.as_deref(), 1).max(1);
        let per_page = parse_or(self.per_page.as_deref(), DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        ((page - 1).saturating_mul(per_page), per_page)
    }
}

fn parse_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}
