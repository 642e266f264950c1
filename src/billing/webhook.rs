//! Stripe webhook signature verification and event classification.
//!
//! The `Stripe-Signature` header looks like `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` value is an HMAC-SHA256 over `"<t>.<raw body>"` keyed with the
//! endpoint secret; any one matching signature is enough.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

pub const MAX_BODY_BYTES: usize = 65_536;
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook secret not configured")]
    NotConfigured,
    #[error("payload exceeds {MAX_BODY_BYTES} bytes")]
    PayloadTooLarge,
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("no signature matched the payload")]
    SignatureMismatch,
    #[error("timestamp outside the tolerance window")]
    TimestampOutsideTolerance,
    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted,
    PaymentFailed,
    Other(String),
}

impl PaymentEvent {
    #[must_use]
    pub fn classify(kind: &str) -> Self {
        match kind {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "invoice.payment_failed" => Self::PaymentFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for pair in header.split(',') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| WebhookError::MalformedHeader)?);
            }
            "v1" => {
                // Undecodable entries are skipped; they can never match.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Check the signature header against the raw payload.
///
/// # Errors
/// Any header, signature or timestamp failure.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &[u8],
    now: i64,
    tolerance_seconds: i64,
) -> Result<(), WebhookError> {
    let header = parse_header(header.ok_or(WebhookError::MissingHeader)?)?;

    let matched = header.signatures.iter().any(|signature| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(signature).is_ok()
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }
    if (now - header.timestamp).abs() > tolerance_seconds {
        return Err(WebhookError::TimestampOutsideTolerance);
    }
    Ok(())
}

/// # Errors
/// `InvalidPayload` if the body is not a Stripe event object.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Build a header value the way Stripe signs; used by tests and local tooling.
#[must_use]
pub fn sign(payload: &[u8], secret: &[u8], timestamp: i64) -> String {
    let signature = HmacSha256::new_from_slice(secret).map_or_else(
        |_| String::new(),
        |mut mac| {
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        },
    );
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const SECRET: &[u8] = b"whsec_test";
    const NOW: i64 = 1_700_000_000;
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[test]
    fn valid_signature_is_accepted() {
        let header = sign(PAYLOAD, SECRET, NOW);
        assert!(verify_signature(PAYLOAD, Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn any_matching_v1_is_enough() {
        let valid = sign(PAYLOAD, SECRET, NOW);
        let Some((_, good)) = valid.split_once(",v1=") else {
            panic!("signed header has no v1");
        };
        let header = format!("t={NOW},v1={},v1={good}", "00".repeat(32));
        assert!(verify_signature(PAYLOAD, Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW);
        let result = verify_signature(b"{}", Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign(PAYLOAD, b"other", NOW);
        let result = verify_signature(PAYLOAD, Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW - DEFAULT_TOLERANCE_SECONDS - 1);
        let result = verify_signature(PAYLOAD, Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS);
        assert!(matches!(result, Err(WebhookError::TimestampOutsideTolerance)));

        let edge = sign(PAYLOAD, SECRET, NOW - DEFAULT_TOLERANCE_SECONDS);
        assert!(verify_signature(PAYLOAD, Some(&edge), SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn malformed_headers() {
        assert!(matches!(
            verify_signature(PAYLOAD, None, SECRET, NOW, 300),
            Err(WebhookError::MissingHeader)
        ));
        assert!(matches!(
            verify_signature(PAYLOAD, Some("v1=abcd"), SECRET, NOW, 300),
            Err(WebhookError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(PAYLOAD, Some("t=abc,v1=abcd"), SECRET, NOW, 300),
            Err(WebhookError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(PAYLOAD, Some(&format!("t={NOW}")), SECRET, NOW, 300),
            Err(WebhookError::MalformedHeader)
        ));
    }

    #[test]
    fn events_are_classified() -> Result<()> {
        let event = parse_event(PAYLOAD)?;
        assert_eq!(event.id, "evt_1");
        assert_eq!(PaymentEvent::classify(&event.kind), PaymentEvent::CheckoutCompleted);
        assert_eq!(
            PaymentEvent::classify("invoice.payment_failed"),
            PaymentEvent::PaymentFailed
        );
        assert_eq!(
            PaymentEvent::classify("customer.created"),
            PaymentEvent::Other("customer.created".to_string())
        );
        assert!(parse_event(b"not json").is_err());
        Ok(())
    }
}
