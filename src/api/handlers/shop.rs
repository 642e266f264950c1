//! Checkout and payment webhook endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    bad_payload,
    principal::require_auth,
    types::{CheckoutRequestBody, CheckoutResponse, ErrorResponse, WebhookResponse},
};
use crate::{
    auth::{AuthError, AuthFlow},
    billing::{parse_quantity, CheckoutRequest, PaymentEvent, Payments, WebhookError},
};

const STRIPE_SIGNATURE: &str = "stripe-signature";

#[utoipa::path(
    post,
    path = "/shop/checkout",
    request_body = CheckoutRequestBody,
    responses(
        (status = 303, description = "Redirect to the hosted checkout page", body = CheckoutResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 503, description = "Payments not configured", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "shop"
)]
pub async fn checkout(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payments: Extension<Arc<Payments>>,
    payload: Result<Json<CheckoutRequestBody>, JsonRejection>,
) -> Response {
    let user = match require_auth(&headers, &flow).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_payload(&rejection),
    };

    let product = request.product.trim();
    if product.is_empty() {
        return AuthError::Validation("Missing product".to_string()).into_response();
    }
    let Some(quantity) = parse_quantity(&request.quantity) else {
        return AuthError::Validation("Quantity must be a positive integer".to_string())
            .into_response();
    };
    let Some(provider) = payments.checkout() else {
        return AuthError::Unavailable("Payments are not configured").into_response();
    };

    let customer = match flow.ensure_customer(&user).await {
        Ok(customer) => customer,
        Err(err) => return err.into_response(),
    };

    let checkout = CheckoutRequest {
        user_id: user.id,
        customer: &customer,
        product,
        quantity,
    };
    let url = match provider.create_checkout(&checkout).await {
        Ok(url) => url,
        Err(err) => {
            error!(user_id = user.id, "Failed to create checkout session: {err}");
            return AuthError::Internal.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match HeaderValue::from_str(&url) {
        Ok(location) => {
            response_headers.insert(LOCATION, location);
        }
        Err(err) => {
            error!("Checkout URL is not a valid header value: {err}");
            return AuthError::Internal.into_response();
        }
    }
    (
        StatusCode::SEE_OTHER,
        response_headers,
        Json(CheckoutResponse { url }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/shop/webhook",
    request_body(content = String, description = "Raw Stripe event", content_type = "application/json"),
    params(
        ("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")
    ),
    responses(
        (status = 200, description = "Event received", body = WebhookResponse),
        (status = 400, description = "Invalid signature or payload", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 503, description = "Webhook secret not configured", body = ErrorResponse)
    ),
    tag = "shop"
)]
pub async fn webhook(
    headers: HeaderMap,
    payments: Extension<Arc<Payments>>,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|value| value.to_str().ok());

    let (event, kind) = match payments.receive_webhook(&body, signature) {
        Ok(received) => received,
        Err(WebhookError::NotConfigured) => {
            error!("Webhook received but no webhook secret is configured");
            return AuthError::Unavailable("Webhook not configured").into_response();
        }
        Err(WebhookError::PayloadTooLarge) => {
            let body = Json(ErrorResponse {
                error: WebhookError::PayloadTooLarge.to_string(),
                error_code: "payload_too_large".to_string(),
            });
            return (StatusCode::PAYLOAD_TOO_LARGE, body).into_response();
        }
        Err(err) => {
            warn!("Rejected webhook: {err}");
            return AuthError::Validation("Invalid webhook".to_string()).into_response();
        }
    };

    match kind {
        PaymentEvent::CheckoutCompleted => info!(event_id = %event.id, "checkout completed"),
        PaymentEvent::PaymentFailed => warn!(event_id = %event.id, "invoice payment failed"),
        PaymentEvent::Other(kind) => info!(event_id = %event.id, kind = %kind, "unhandled payment event"),
    }

    (StatusCode::OK, Json(WebhookResponse { received: true })).into_response()
}
