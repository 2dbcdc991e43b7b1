use crate::server::response::ApiError;

/// Unwraps a required request field, treating blank strings as missing.
pub fn required(value: Option<String>, message: &'static str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(message)),
    }
}
