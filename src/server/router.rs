use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::account::account_router;
use super::api::api_router;
use crate::auth::{TokenGenerator, TokenTtl};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::{BlobStore, Store, StoreProvider};

pub struct AppState {
    pub provider: Arc<StoreProvider>,
    pub config: ServerConfig,
    pub tokens: TokenGenerator,
    pub token_ttl: TokenTtl,
}

impl AppState {
    /// Expects `provider` to be initialized already.
    pub fn new(provider: Arc<StoreProvider>, config: ServerConfig) -> Result<Self> {
        Ok(Self {
            provider,
            tokens: TokenGenerator::new()?,
            token_ttl: config.token_ttl()?,
            config,
        })
    }

    pub fn store(&self) -> Result<Arc<dyn Store>> {
        self.provider.get_store()
    }

    pub fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        self.provider.get_blob_store()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .nest("/auth", account_router())
        .nest("/api", api_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
