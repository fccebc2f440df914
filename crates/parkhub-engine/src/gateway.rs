//! Payment gateway adapter
//!
//! REST client for a hosted-checkout payment provider, plus webhook
//! signature verification. The provider redirects the customer to a hosted
//! page; completion lands back on us through the webhook and the redirect
//! funnel, both of which re-check the authoritative session state.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use parkhub_core::config::GatewayConfig;
use parkhub_core::models::Booking;
use parkhub_core::traits::{CheckoutSession, PaymentGateway, PaymentOutcome};
use parkhub_core::AppError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

type HmacSha256 = Hmac<sha2::Sha256>;

/// Verify a webhook signature: hex-encoded HMAC-SHA256 of the raw body.
///
/// Comparison happens inside the mac verification, which is constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), AppError> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| AppError::SignatureInvalid("signature is not valid hex".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("webhook secret is empty".to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::SignatureInvalid("signature mismatch".to_string()))
}

/// A parsed webhook notification from the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event discriminator, e.g. `checkout.completed`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Checkout session the event refers to
    pub session_id: String,
    /// Booking carried through session metadata
    pub booking_id: Uuid,
    /// Gateway transaction reference, present on completed events
    #[serde(default)]
    pub payment_ref: Option<String>,
}

impl WebhookEvent {
    /// Whether this event reports a completed payment
    pub fn is_completed(&self) -> bool {
        self.event_type == "checkout.completed"
    }

    /// Whether this event reports the session will never complete
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            "checkout.expired" | "checkout.cancelled" | "checkout.failed"
        )
    }
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    amount: i64,
    currency: &'a str,
    success_url: String,
    cancel_url: String,
    metadata: SessionMetadata,
}

#[derive(Serialize)]
struct SessionMetadata {
    booking_id: Uuid,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct SessionStateResponse {
    status: String,
    #[serde(default)]
    payment_ref: Option<String>,
}

/// Convert a decimal amount to gateway minor units (cents)
fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Gateway(format!("amount {} out of range", amount)))
}

/// Hosted-checkout gateway over HTTP
pub struct RestCheckoutGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    success_redirect: String,
    failure_redirect: String,
}

impl RestCheckoutGateway {
    /// Build a gateway client from configuration
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            success_redirect: cfg.success_redirect.clone(),
            failure_redirect: cfg.failure_redirect.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RestCheckoutGateway {
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn create_checkout_session(
        &self,
        booking: &Booking,
        amount: Decimal,
        currency: &str,
    ) -> Result<CheckoutSession, AppError> {
        let request = CreateSessionRequest {
            amount: to_minor_units(amount)?,
            currency,
            // The provider substitutes its session id into the placeholder
            success_url: format!(
                "{}?booking_id={}&session_id={{SESSION_ID}}",
                self.success_redirect, booking.id
            ),
            cancel_url: format!("{}?booking_id={}", self.failure_redirect, booking.id),
            metadata: SessionMetadata {
                booking_id: booking.id,
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("session create failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "session create returned {}",
                response.status()
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("malformed session response: {}", e)))?;

        debug!(session_id = %session.id, "checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url: session.url,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_outcome(&self, session_id: &str) -> Result<PaymentOutcome, AppError> {
        let response = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.base_url, session_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("session fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "session fetch returned {}",
                response.status()
            )));
        }

        let state: SessionStateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("malformed session state: {}", e)))?;

        if state.status == "paid" {
            let payment_ref = state
                .payment_ref
                .unwrap_or_else(|| session_id.to_string());
            Ok(PaymentOutcome::Paid { payment_ref })
        } else {
            Ok(PaymentOutcome::Unpaid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_passes() {
        let body = br#"{"type":"checkout.completed"}"#;
        let sig = sign("whsec_test", body);
        assert!(verify_signature("whsec_test", body, &sig).is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let sig = sign("whsec_test", b"original");
        assert!(matches!(
            verify_signature("whsec_test", b"tampered", &sig),
            Err(AppError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = b"payload";
        let sig = sign("whsec_other", body);
        assert!(verify_signature("whsec_test", body, &sig).is_err());
    }

    #[test]
    fn test_garbage_signature_fails() {
        assert!(matches!(
            verify_signature("whsec_test", b"payload", "not-hex!"),
            Err(AppError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec!(300)).unwrap(), 30000);
        assert_eq!(to_minor_units(dec!(10.50)).unwrap(), 1050);
    }

    #[test]
    fn test_webhook_event_parsing() {
        let booking_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"checkout.completed","session_id":"cs_1","booking_id":"{}","payment_ref":"txn_9"}}"#,
            booking_id
        );
        let event: WebhookEvent = serde_json::from_str(&json).unwrap();
        assert!(event.is_completed());
        assert_eq!(event.booking_id, booking_id);
        assert_eq!(event.payment_ref.as_deref(), Some("txn_9"));
    }

    #[test]
    fn test_webhook_event_kinds() {
        let event = |kind: &str| WebhookEvent {
            event_type: kind.to_string(),
            session_id: "cs_1".to_string(),
            booking_id: Uuid::new_v4(),
            payment_ref: None,
        };
        assert!(event("checkout.expired").is_terminated());
        assert!(event("checkout.cancelled").is_terminated());
        assert!(event("checkout.failed").is_terminated());
        assert!(!event("checkout.completed").is_terminated());
        // Unknown kinds are neither completed nor terminal
        let unknown = event("checkout.updated");
        assert!(!unknown.is_completed());
        assert!(!unknown.is_terminated());
    }
}
