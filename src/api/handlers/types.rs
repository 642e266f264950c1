//! Request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignInResponse {
    pub token: String,
    pub redirect: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SendVerificationRequest {
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CompleteVerificationRequest {
    pub email: String,
    pub code: String,
}

/// Proof-of-knowledge update: `old` must equal the stored value.
#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateFieldRequest {
    pub new: String,
    pub old: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CheckoutRequestBody {
    pub product: String,
    /// Positive integer, sent as a string.
    pub quantity: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct WebhookResponse {
    pub received: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}
