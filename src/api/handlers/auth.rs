//! Signup, signin and email verification endpoints.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::{
    bad_payload,
    types::{
        CompleteVerificationRequest, ErrorResponse, MessageResponse, SendVerificationRequest,
        SignInRequest, SignInResponse, SignUpRequest,
    },
};
use crate::auth::{AuthError, AuthFlow};

const SIGNIN_REDIRECT: &str = "/dashboard";

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Username or email already exists", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow
        .signup(&request.username, &request.email, &request.password)
        .await
    {
        Ok(_) => (StatusCode::CREATED, Json(MessageResponse::new("created"))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in, token also set as the jwt cookie", body = SignInResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signin(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    let session = match flow.signin(&request.email, &request.password).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    let cookie = match HeaderValue::from_str(&session.cookie.header_value()) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return AuthError::Internal.into_response();
        }
    };
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    let body = SignInResponse {
        token: session.token,
        redirect: SIGNIN_REDIRECT.to_string(),
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/auth/email/send",
    request_body = SendVerificationRequest,
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn send_verification(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<SendVerificationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow.send_verification_email(&request.email).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("sent"))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/email/verify",
    request_body = CompleteVerificationRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Code expired", body = ErrorResponse),
        (status = 404, description = "User or code not found", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn complete_verification(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<CompleteVerificationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    match flow
        .complete_verification(&request.email, &request.code)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("verified"))).into_response(),
        Err(err) => err.into_response(),
    }
}
