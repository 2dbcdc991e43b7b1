//! # Docvault
//!
//! A document and file storage API: users keep named indexes of text and
//! file entries and search them by keyword or full text. Usable both as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! docvault = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docvault::config::ServerConfig;
//! use docvault::records::ensure_indexes;
//! use docvault::server::{AppState, create_router};
//! use docvault::store::StoreProvider;
//!
//! let config = ServerConfig::default();
//! let provider = Arc::new(StoreProvider::new());
//! provider.initialize(config.store_config());
//! ensure_indexes(provider.get_store()?.as_ref())?;
//!
//! let state = Arc::new(AppState::new(provider, config)?);
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `docvault` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod records;
pub mod server;
pub mod store;
pub mod types;
