use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::session::validate_token;
use crate::error::Error;
use crate::server::AppState;
use crate::types::{Token, TokenKind, User};

/// Extractor for routes that need a valid access token.
pub struct RequireUser {
    pub token: Token,
    pub user: User,
}

/// Extractor for the token refresh route. Only refresh tokens pass.
pub struct RequireRefresh {
    pub token: Token,
    pub user: User,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"docvault\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (token, user) = authorize(parts, state, TokenKind::Access)?;
        Ok(RequireUser { token, user })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireRefresh {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (token, user) = authorize(parts, state, TokenKind::Refresh)?;
        Ok(RequireRefresh { token, user })
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidScheme)
}

fn authorize(parts: &Parts, state: &AppState, kind: TokenKind) -> Result<(Token, User), AuthError> {
    let raw_token = bearer_token(parts)?;

    let store = state.store().map_err(|e| {
        tracing::error!("Store unavailable during authentication: {e}");
        AuthError::InternalError
    })?;

    validate_token(store.as_ref(), &state.tokens, raw_token, kind).map_err(|e| match e {
        Error::Unauthorized | Error::InvalidTokenFormat => AuthError::InvalidToken,
        Error::TokenExpired => AuthError::TokenExpired,
        e => {
            tracing::error!("Token validation failed: {e}");
            AuthError::InternalError
        }
    })
}
