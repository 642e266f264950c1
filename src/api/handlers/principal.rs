//! Authenticated principal extraction.
//!
//! Read the session token from the `Authorization: Bearer` header or the `jwt`
//! cookie, then resolve it to a verified user through the auth flow.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};

use crate::{
    auth::{session::SESSION_COOKIE_NAME, AuthError, AuthFlow},
    store::User,
};

/// Resolve the request's session into a verified user.
///
/// # Errors
/// `Unauthorized` when no token is present or it does not check out,
/// `Forbidden` for unverified users.
pub async fn require_auth(headers: &HeaderMap, flow: &AuthFlow) -> Result<User, AuthError> {
    let token = extract_session_token(headers).ok_or(AuthError::Unauthorized("Missing token"))?;
    flow.current_user(&token).await
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    for pair in value.split(';') {
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
