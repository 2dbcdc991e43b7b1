use chrono::TimeDelta;
use serde::Serialize;

use super::{TokenGenerator, parse_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Token, TokenKind, User, timestamp};

const ISSUE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Lifetimes of newly issued tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access: TimeDelta,
    pub refresh: TimeDelta,
}

fn issue(
    store: &dyn Store,
    generator: &TokenGenerator,
    user_id: &str,
    kind: TokenKind,
    ttl: TimeDelta,
) -> Result<String> {
    // Lookups are 32 random bits, so a clash is rare but possible.
    for _ in 0..ISSUE_ATTEMPTS {
        let (raw_token, lookup, hash) = generator.generate()?;
        let now = timestamp::now();
        let token = Token {
            id: uuid::Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            kind,
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };

        match token.insert(store) {
            Ok(()) => return Ok(raw_token),
            Err(Error::Duplicate) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::Duplicate)
}

pub fn issue_token_pair(
    store: &dyn Store,
    generator: &TokenGenerator,
    user_id: &str,
    ttl: TokenTtl,
) -> Result<TokenPair> {
    Ok(TokenPair {
        access_token: issue(store, generator, user_id, TokenKind::Access, ttl.access)?,
        refresh_token: issue(store, generator, user_id, TokenKind::Refresh, ttl.refresh)?,
    })
}

/// Resolves a raw bearer token of the expected kind to its record and user.
///
/// Unknown, mismatched, and wrong-kind tokens all fail with `Unauthorized` so
/// the response never hints at which check tripped.
pub fn validate_token(
    store: &dyn Store,
    generator: &TokenGenerator,
    raw_token: &str,
    kind: TokenKind,
) -> Result<(Token, User)> {
    let (lookup, _secret) = parse_token(raw_token)?;

    let token = Token::find_by_lookup(store, &lookup)?.ok_or(Error::Unauthorized)?;
    if !generator.verify(raw_token, &token.token_hash)? {
        return Err(Error::Unauthorized);
    }
    if token.expires_at <= timestamp::now() {
        return Err(Error::TokenExpired);
    }
    if token.kind != kind {
        return Err(Error::Unauthorized);
    }

    let user = User::find_by_id(store, &token.user_id)?.ok_or(Error::Unauthorized)?;
    Ok((token, user))
}

/// Checks a username/password pair. Unknown users and wrong passwords are
/// indistinguishable to the caller.
pub fn authenticate(
    store: &dyn Store,
    generator: &TokenGenerator,
    username: &str,
    password: &str,
) -> Result<User> {
    let user = User::find_by_username(store, username)?.ok_or(Error::Unauthorized)?;
    if !generator.verify(password, &user.password_hash)? {
        return Err(Error::Unauthorized);
    }
    Ok(user)
}
