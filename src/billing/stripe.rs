//! Stripe REST client (form-encoded requests, bearer secret key).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, Instrument};
use url::Url;

use super::{BillingError, CheckoutProvider, CheckoutRequest, CustomerProvisioner};
use crate::APP_USER_AGENT;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
const CURRENCY: &str = "eur";
const UNIT_AMOUNT: u64 = 99;
const PAYMENT_METHODS: [&str; 2] = ["card", "paypal"];

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: Url,
    secret_key: SecretString,
    domain: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base.as_str())
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// `domain` is the public site base used for the success/cancel redirects.
    ///
    /// # Errors
    /// Returns an error if the API base is not a valid URL or the HTTP client cannot be built.
    pub fn new(secret_key: SecretString, domain: &str, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).with_context(|| format!("invalid Stripe API base: {api_base}"))?;
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base,
            secret_key,
            domain: domain.trim_end_matches('/').to_string(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, BillingError> {
        let url = self
            .api_base
            .join(path)
            .map_err(|err| BillingError::InvalidResponse(format!("bad endpoint {path}: {err}")))?;
        let span = tracing::info_span!("stripe.request", http.method = "POST", http.path = path);
        let response = self
            .http
            .post(url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .instrument(span)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| BillingError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl CustomerProvisioner for StripeClient {
    async fn create_customer(&self, name: &str, email: &str) -> String {
        let form = vec![
            ("name".to_string(), name.to_string()),
            ("email".to_string(), email.to_string()),
        ];
        match self.post_form::<CustomerResponse>("/v1/customers", &form).await {
            Ok(customer) => customer.id,
            Err(err) => {
                error!("Failed to create billing customer: {err}");
                String::new()
            }
        }
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_checkout(&self, request: &CheckoutRequest<'_>) -> Result<String, BillingError> {
        let form = checkout_form(&self.domain, request);
        let session = self
            .post_form::<CheckoutSessionResponse>("/v1/checkout/sessions", &form)
            .await?;
        let url = session
            .url
            .ok_or_else(|| BillingError::InvalidResponse("missing checkout url".to_string()))?;
        info!(
            product = request.product,
            quantity = request.quantity,
            "checkout link"
        );
        Ok(url)
    }
}

/// Form body for `POST /v1/checkout/sessions`.
pub(crate) fn checkout_form(domain: &str, request: &CheckoutRequest<'_>) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), format!("{domain}/success")),
        ("cancel_url".to_string(), format!("{domain}/failure")),
        (
            "line_items[0][price_data][currency]".to_string(),
            CURRENCY.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.product.to_string(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            UNIT_AMOUNT.to_string(),
        ),
        (
            "line_items[0][quantity]".to_string(),
            request.quantity.to_string(),
        ),
        ("metadata[user]".to_string(), request.user_id.to_string()),
        ("metadata[product]".to_string(), request.product.to_string()),
        (
            "metadata[quantity]".to_string(),
            request.quantity.to_string(),
        ),
    ];
    for (index, method) in PAYMENT_METHODS.iter().enumerate() {
        form.push((
            format!("payment_method_types[{index}]"),
            (*method).to_string(),
        ));
    }
    if !request.customer.is_empty() {
        form.push(("customer".to_string(), request.customer.to_string()));
    }
    form
}
