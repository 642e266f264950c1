//! Account management for verified users.
//!
//! Every route authenticates first, so an anonymous caller learns nothing
//! about the payload rules.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{
    bad_payload,
    principal::require_auth,
    types::{ErrorResponse, MessageResponse, PasswordRequest, UpdateFieldRequest},
};
use crate::auth::AuthFlow;

#[utoipa::path(
    put,
    path = "/account/update/name",
    request_body = UpdateFieldRequest,
    responses(
        (status = 200, description = "Username updated", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 404, description = "Current username does not match", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn update_name(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<UpdateFieldRequest>, JsonRejection>,
) -> Response {
    let user = match require_auth(&headers, &flow).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow.update_username(&user, &request.new, &request.old).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("updated"))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/account/update/email",
    request_body = UpdateFieldRequest,
    responses(
        (status = 200, description = "Email updated", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 404, description = "Current email does not match", body = ErrorResponse),
        (status = 409, description = "Email already used", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn update_email(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<UpdateFieldRequest>, JsonRejection>,
) -> Response {
    let user = match require_auth(&headers, &flow).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow.update_email(&user, &request.new, &request.old).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("updated"))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/account/update/password",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn update_password(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Response {
    let user = match require_auth(&headers, &flow).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow.update_password(&user, &request.password).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("updated"))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/account/delete",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Not signed in or wrong password", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn delete(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Response {
    let user = match require_auth(&headers, &flow).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow.delete_account(&user, &request.password).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("deleted"))).into_response(),
        Err(err) => err.into_response(),
    }
}
