use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::auth::{RequireRefresh, RequireUser, authenticate, issue_token_pair};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CredentialsRequest, SessionResponse, UserResponse};
use crate::server::response::{ApiError, StoreResultExt};
use crate::server::validation::required;
use crate::types::{Token, User};

const CREDENTIALS_REQUIRED: &str = "Username and password are required";

pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}

fn credentials(payload: Result<Json<CredentialsRequest>, JsonRejection>) -> Result<(String, String), ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request(CREDENTIALS_REQUIRED))?;
    Ok((
        required(req.username, CREDENTIALS_REQUIRED)?,
        required(req.password, CREDENTIALS_REQUIRED)?,
    ))
}

fn session(state: &AppState, user: &User) -> Result<SessionResponse, ApiError> {
    let store = state.store().api_err("Failed to open store")?;
    let pair = issue_token_pair(store.as_ref(), &state.tokens, &user.id, state.token_ttl)
        .api_err("Failed to issue tokens")?;

    Ok(SessionResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: UserResponse::from(user),
    })
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (username, password) = credentials(payload)?;
    let store = state.store().api_err("Failed to open store")?;

    if User::find_by_username(store.as_ref(), &username)
        .api_err("Failed to check username")?
        .is_some()
    {
        return Err(ApiError::conflict("Username already exists"));
    }

    let hash = state.tokens.hash(&password).api_err("Failed to hash password")?;
    let user = User::create(store.as_ref(), &username, &hash).api_err("Username already exists")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(session(&state, &user)?)))
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (username, password) = credentials(payload)?;
    let store = state.store().api_err("Failed to open store")?;

    let user = authenticate(store.as_ref(), &state.tokens, &username, &password).map_err(|e| match e {
        Error::Unauthorized => ApiError::unauthorized("Invalid username or password"),
        e => ApiError::from(e),
    })?;

    Ok::<_, ApiError>(Json(session(&state, &user)?))
}

/// POST /auth/refresh - trades a refresh token for a new pair, revoking it.
async fn refresh(auth: RequireRefresh, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store().api_err("Failed to open store")?;

    // A concurrent refresh may have revoked it first; only one caller wins.
    if !Token::delete(store.as_ref(), &auth.token.id).api_err("Failed to revoke token")? {
        return Err(ApiError::unauthorized("Invalid token"));
    }

    Ok::<_, ApiError>(Json(session(&state, &auth.user)?))
}

/// GET /auth/me
async fn me(auth: RequireUser) -> impl IntoResponse {
    Json(UserResponse::from(&auth.user))
}
