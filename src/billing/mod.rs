//! Payment processor integration.
//!
//! Two seams: [`CustomerProvisioner`] creates the billing customer a user is
//! charged under, [`CheckoutProvider`] opens a hosted checkout session. Stripe
//! implements both; without a secret key the service runs with
//! [`NoopProvisioner`] and checkout answers 503.

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

pub use stripe::StripeClient;
pub use webhook::{PaymentEvent, WebhookError, WebhookEvent};

use crate::clock::SharedClock;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("payment provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("payment provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Hosted checkout for a single product line.
#[derive(Debug)]
pub struct CheckoutRequest<'a> {
    pub user_id: i64,
    pub customer: &'a str,
    pub product: &'a str,
    pub quantity: u64,
}

#[async_trait]
pub trait CustomerProvisioner: Send + Sync {
    /// Create a billing customer and return its reference, or `""` when the
    /// provider is unreachable. Failure is logged, never fatal.
    async fn create_customer(&self, name: &str, email: &str) -> String;
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Open a checkout session and return the URL the buyer is redirected to.
    async fn create_checkout(&self, request: &CheckoutRequest<'_>) -> Result<String, BillingError>;
}

/// Used when no payment processor is configured.
#[derive(Clone, Debug)]
pub struct NoopProvisioner;

#[async_trait]
impl CustomerProvisioner for NoopProvisioner {
    async fn create_customer(&self, _name: &str, _email: &str) -> String {
        String::new()
    }
}

/// Checkout and webhook configuration shared with the shop handlers.
#[derive(Clone)]
pub struct Payments {
    checkout: Option<Arc<dyn CheckoutProvider>>,
    webhook_secret: Option<SecretString>,
    tolerance_seconds: i64,
    clock: SharedClock,
}

impl std::fmt::Debug for Payments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payments")
            .field("checkout", &self.checkout.is_some())
            .field("webhook", &self.webhook_secret.is_some())
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish_non_exhaustive()
    }
}

impl Payments {
    #[must_use]
    pub fn new(
        checkout: Option<Arc<dyn CheckoutProvider>>,
        webhook_secret: Option<SecretString>,
        clock: SharedClock,
    ) -> Self {
        Self {
            checkout,
            webhook_secret,
            tolerance_seconds: webhook::DEFAULT_TOLERANCE_SECONDS,
            clock,
        }
    }

    /// Payments switched off entirely.
    #[must_use]
    pub fn disabled(clock: SharedClock) -> Self {
        Self::new(None, None, clock)
    }

    #[must_use]
    pub fn checkout(&self) -> Option<&Arc<dyn CheckoutProvider>> {
        self.checkout.as_ref()
    }

    /// Authenticate and classify an inbound webhook delivery.
    ///
    /// # Errors
    /// `NotConfigured` without a webhook secret, `PayloadTooLarge` past 64 KiB,
    /// otherwise any signature or payload failure.
    pub fn receive_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(WebhookEvent, PaymentEvent), WebhookError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(WebhookError::NotConfigured)?;
        if payload.len() > webhook::MAX_BODY_BYTES {
            return Err(WebhookError::PayloadTooLarge);
        }
        webhook::verify_signature(
            payload,
            signature,
            secret.expose_secret().as_bytes(),
            self.clock.now().timestamp(),
            self.tolerance_seconds,
        )?;
        let event = webhook::parse_event(payload)?;
        let kind = PaymentEvent::classify(&event.kind);
        Ok((event, kind))
    }
}

/// Quantity arrives as a string and must be a positive integer.
#[must_use]
pub fn parse_quantity(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|quantity| *quantity > 0)
}
