use axum::{
    Json,
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{Error, Result as StoreResult};

/// API error that converts to a `{"error": message}` response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    #[must_use]
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Client-facing errors keep their message. Everything else is logged and
/// reported as a bare internal error.
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(message) => ApiError::bad_request(message),
            Error::NotFound => ApiError::not_found("Not found"),
            Error::Duplicate => ApiError::conflict("Already exists"),
            Error::Conflict(message) => ApiError::conflict(message),
            Error::Unauthorized | Error::InvalidTokenFormat => ApiError::unauthorized("Invalid token"),
            Error::TokenExpired => ApiError::unauthorized("Token expired"),
            err => {
                tracing::error!("Internal error: {err}");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::payload_too_large("Upload exceeds the maximum allowed size");
        }
        ApiError::new(status, format!("Failed to read multipart body: {}", err.body_text()))
    }
}

/// Extension trait for converting store results to API errors.
///
/// `Duplicate` and `NotFound` take `message`; other client errors keep their
/// own text; internal failures are logged under `message`.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            Error::Duplicate => ApiError::conflict(message),
            Error::NotFound => ApiError::not_found(message),
            Error::Validation(_)
            | Error::Conflict(_)
            | Error::Unauthorized
            | Error::InvalidTokenFormat
            | Error::TokenExpired => ApiError::from(e),
            e => {
                tracing::error!("{message}: {e}");
                ApiError::internal("Internal server error")
            }
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, json) = body(ApiError::bad_request("Name is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "Name is required" }));
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let err = ApiError::from(Error::Corrupt("blob-1".to_string()));
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::Duplicate, StatusCode::CONFLICT),
            (Error::Conflict("x".to_string()), StatusCode::CONFLICT),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (Error::NotInitialized, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_api_err_uses_context_message() {
        let err = StoreResult::<()>::Err(Error::Duplicate)
            .api_err("Index with this name already exists")
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Index with this name already exists");

        let err = StoreResult::<()>::Err(Error::Validation("Content is required".to_string()))
            .api_err("Failed to create entry")
            .unwrap_err();
        assert_eq!(err.message, "Content is required");

        let err = StoreResult::<()>::Err(Error::NotConnected)
            .api_err("Failed to create entry")
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
