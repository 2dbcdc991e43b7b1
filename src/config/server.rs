use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;

use crate::auth::TokenTtl;
use crate::error::{Error, Result};
use crate::store::StoreConfig;

pub const DEFAULT_DATABASE_NAME: &str = "docvault";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub database_name: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Request bodies above this size are rejected with 413.
    pub max_upload_bytes: usize,
    /// Puts the store provider in test mode and switches to the
    /// `<database_name>_test` database.
    pub testing: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        let database_name = if self.testing {
            format!("{}_test", self.database_name)
        } else {
            self.database_name.clone()
        };
        StoreConfig::new(self.data_dir.to_string_lossy(), database_name)
    }

    pub fn token_ttl(&self) -> Result<TokenTtl> {
        let convert = |ttl: Duration| {
            TimeDelta::from_std(ttl).map_err(|e| Error::Config(format!("token lifetime out of range: {e}")))
        };
        Ok(TokenTtl {
            access: convert(self.access_token_ttl)?,
            refresh: convert(self.refresh_token_ttl)?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            testing: false,
        }
    }
}
