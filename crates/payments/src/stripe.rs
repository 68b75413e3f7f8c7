//! Stripe Checkout and webhook handling.

use async_trait::async_trait;
use roastme_core::credits::CreditPackage;
use roastme_core::hashing::verify_hmac_sha256_hex;
use serde::Deserialize;

use crate::config::StripeConfig;
use crate::{
    ensure_success, user_id_from, CheckoutProvider, CheckoutRequest, CheckoutSession,
    PaymentError, ProviderKind, PurchaseEvent, WebhookEvent,
};

/// Maximum accepted age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// The only event type that credits a purchase.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    pub fn new(client: reqwest::Client, config: StripeConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = checkout_form(request);
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;
        let session: SessionResponse = ensure_success(response).await?.json().await?;

        let url = session.url.ok_or_else(|| PaymentError::Api {
            status: 200,
            body: format!("checkout session {} has no url", session.id),
        })?;
        tracing::info!(
            user_id = request.user_id,
            package = %request.package,
            session_id = %session.id,
            "Stripe checkout session created"
        );
        Ok(CheckoutSession {
            provider: ProviderKind::Stripe,
            id: session.id,
            url,
        })
    }
}

/// Form-encoded body for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let package = request.package;
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("client_reference_id".into(), request.user_id.to_string()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("line_items[0][price_data][currency]".into(), "usd".into()),
        (
            "line_items[0][price_data][unit_amount]".into(),
            package.price_cents().to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".into(),
            format!("{} ({} credits)", package.name(), package.credits()),
        ),
        ("metadata[user_id]".into(), request.user_id.to_string()),
        ("metadata[package]".into(), package.as_str().to_string()),
    ];
    if let Some(email) = &request.email {
        form.push(("customer_email".into(), email.clone()));
    }
    form
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// The signed payload is `"{t}.{body}"`. Any `v1` entry may match; the
/// timestamp must be within [`SIGNATURE_TOLERANCE_SECS`] of `now_unix`.
pub fn verify_signature(
    header: &str,
    body: &[u8],
    secret: &str,
    now_unix: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(body);
    if signatures
        .iter()
        .any(|sig| verify_hmac_sha256_hex(secret.as_bytes(), &signed, sig))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

/// Parse a verified webhook body.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: Event =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
    if event.event_type != CHECKOUT_COMPLETED {
        return Ok(WebhookEvent::Ignored {
            event_type: event.event_type,
        });
    }

    let session = &event.data.object;
    // A session without a payment status is treated as unpaid.
    let payment_status = session["payment_status"].as_str().unwrap_or("missing");
    if payment_status != "paid" && payment_status != "no_payment_required" {
        return Ok(WebhookEvent::Ignored {
            event_type: format!("{CHECKOUT_COMPLETED} ({payment_status})"),
        });
    }

    let session_id = session["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PaymentError::InvalidPayload("session id missing".into()))?;

    let metadata = &session["metadata"];
    let user_id = match metadata.get("user_id") {
        Some(v) => user_id_from(Some(v)),
        None => user_id_from(session.get("client_reference_id")),
    }?;
    let package: CreditPackage = metadata["package"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidPayload("metadata.package missing".into()))?
        .parse()
        .map_err(|e: roastme_core::error::CoreError| PaymentError::InvalidPayload(e.to_string()))?;

    Ok(WebhookEvent::Purchase(PurchaseEvent {
        provider: ProviderKind::Stripe,
        event_id: session_id.to_string(),
        user_id,
        package,
        amount_cents: session["amount_total"].as_i64(),
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use roastme_core::hashing::hmac_sha256_hex;
    use serde_json::json;

    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(body: &[u8], t: i64) -> String {
        let mut payload = format!("{t}.").into_bytes();
        payload.extend_from_slice(body);
        format!("t={t},v1={}", hmac_sha256_hex(SECRET.as_bytes(), &payload))
    }

    fn completed(metadata: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "amount_total": 999,
                "client_reference_id": "12",
                "metadata": metadata,
            }}
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, 1_700_000_000);
        assert!(verify_signature(&header, body, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn any_v1_entry_may_match() {
        let body = b"{}";
        let good = sign(body, 1_700_000_000);
        let header = format!("t=1700000000,v1=deadbeef,{}", good.split_once(',').unwrap().1);
        assert!(verify_signature(&header, body, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn tampered_body_or_old_timestamp_is_rejected() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, 1_700_000_000);
        assert_matches!(
            verify_signature(&header, br#"{"id":"evt_2"}"#, SECRET, 1_700_000_000),
            Err(PaymentError::InvalidSignature(_))
        );
        assert_matches!(
            verify_signature(&header, body, SECRET, 1_700_000_000 + 301),
            Err(PaymentError::InvalidSignature(msg)) if msg.contains("tolerance")
        );
        assert_matches!(
            verify_signature("v1=abc", body, SECRET, 0),
            Err(PaymentError::InvalidSignature(_))
        );
    }

    #[test]
    fn completed_session_becomes_purchase() {
        let body = completed(json!({ "user_id": "12", "package": "popular" }));
        let event = parse_event(&body).unwrap();
        assert_eq!(
            event,
            WebhookEvent::Purchase(PurchaseEvent {
                provider: ProviderKind::Stripe,
                event_id: "cs_test_1".into(),
                user_id: 12,
                package: CreditPackage::Popular,
                amount_cents: Some(999),
            })
        );
    }

    #[test]
    fn user_falls_back_to_client_reference_id() {
        let body = completed(json!({ "package": "pro" }));
        assert_matches!(
            parse_event(&body),
            Ok(WebhookEvent::Purchase(PurchaseEvent { user_id: 12, .. }))
        );
    }

    #[test]
    fn other_events_are_ignored() {
        let body = br#"{"id":"evt_2","type":"invoice.paid","data":{"object":{}}}"#;
        assert_matches!(
            parse_event(body),
            Ok(WebhookEvent::Ignored { event_type }) if event_type == "invoice.paid"
        );
    }

    #[test]
    fn unpaid_or_unreported_payment_status_is_ignored() {
        for status in [Some("unpaid"), None] {
            let mut object = json!({
                "id": "cs_test_2",
                "client_reference_id": "12",
                "metadata": { "user_id": "12", "package": "starter" },
            });
            if let Some(status) = status {
                object["payment_status"] = json!(status);
            }
            let body = serde_json::to_vec(&json!({
                "id": "evt_3",
                "type": "checkout.session.completed",
                "data": { "object": object }
            }))
            .unwrap();
            assert_matches!(parse_event(&body), Ok(WebhookEvent::Ignored { .. }));
        }
    }

    #[test]
    fn unknown_package_is_invalid() {
        let body = completed(json!({ "user_id": 12, "package": "mega" }));
        assert_matches!(parse_event(&body), Err(PaymentError::InvalidPayload(_)));
    }

    #[test]
    fn checkout_form_carries_metadata() {
        let form = checkout_form(&CheckoutRequest {
            user_id: 5,
            package: CreditPackage::Starter,
            email: Some("a@example.com".into()),
            success_url: "https://app/success".into(),
            cancel_url: "https://app/cancel".into(),
        });
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("metadata[user_id]"), Some("5"));
        assert_eq!(get("metadata[package]"), Some("starter"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("499"));
        assert_eq!(get("customer_email"), Some("a@example.com"));
    }
}
