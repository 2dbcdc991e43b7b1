//! In-process harness: the real router over a private in-memory database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use docvault::config::ServerConfig;
use docvault::records::ensure_indexes;
use docvault::server::{AppState, create_router};
use docvault::store::{Store, StoreConfig, StoreProvider};
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "docvault-test-boundary";

pub struct TestApp {
    router: Router,
    pub provider: Arc<StoreProvider>,
}

pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        if self.bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.bytes).expect("response body is not JSON")
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let provider = Arc::new(StoreProvider::for_tests());
        provider.initialize(StoreConfig::in_memory());
        ensure_indexes(provider.get_store().expect("store").as_ref()).expect("ensure indexes");

        let state = AppState::new(Arc::clone(&provider), config).expect("app state");
        Self {
            router: create_router(Arc::new(state)),
            provider,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.provider.get_store().expect("store")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn upload(&self, uri: &str, token: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build request");
        self.send(request).await
    }

    pub async fn register(&self, username: &str) -> Session {
        let resp = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({ "username": username, "password": "s3cret-pass" })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register {username}");
        let json = resp.json();
        Session {
            access_token: json["access_token"].as_str().expect("access token").to_string(),
            refresh_token: json["refresh_token"].as_str().expect("refresh token").to_string(),
            user_id: json["user"]["id"].as_str().expect("user id").to_string(),
        }
    }

    pub async fn create_index(&self, token: &str, name: &str) -> String {
        let resp = self
            .post("/api/indexes", token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create index {name}");
        resp.json()["id"].as_str().expect("index id").to_string()
    }
}

/// Builds a multipart body with an optional `keywords` field and a `file` part.
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8], keywords: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(keywords) = keywords {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"keywords\"\r\n\r\n{keywords}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
