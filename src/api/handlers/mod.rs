//! API handlers.
//!
//! Handlers decode the payload, call the auth flow and map [`AuthError`] to a
//! JSON error response. Undecodable or missing JSON bodies are a 400.

pub mod account;
pub mod auth;
pub mod health;
pub mod principal;
pub mod root;
pub mod shop;
pub mod types;

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::AuthError;

pub(crate) fn bad_payload(rejection: &JsonRejection) -> Response {
    debug!("Rejected payload: {}", rejection.body_text());
    AuthError::Validation("Missing or invalid payload".to_string()).into_response()
}
