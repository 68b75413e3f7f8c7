//! Lemon Squeezy checkouts and webhook handling.

use async_trait::async_trait;
use roastme_core::credits::CreditPackage;
use roastme_core::hashing::verify_hmac_sha256_hex;
use serde::Deserialize;

use crate::config::LemonSqueezyConfig;
use crate::{
    ensure_success, user_id_from, CheckoutProvider, CheckoutRequest, CheckoutSession,
    PaymentError, ProviderKind, PurchaseEvent, WebhookEvent,
};

/// The only event type that credits a purchase.
pub const ORDER_CREATED: &str = "order_created";

const JSON_API: &str = "application/vnd.api+json";

pub struct LemonSqueezyClient {
    client: reqwest::Client,
    config: LemonSqueezyConfig,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    data: CheckoutData,
}

#[derive(Debug, Deserialize)]
struct CheckoutData {
    id: String,
    attributes: CheckoutAttributes,
}

#[derive(Debug, Deserialize)]
struct CheckoutAttributes {
    url: String,
}

impl LemonSqueezyClient {
    pub fn new(client: reqwest::Client, config: LemonSqueezyConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CheckoutProvider for LemonSqueezyClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LemonSqueezy
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let body = checkout_body(&self.config, request);
        let response = self
            .client
            .post(format!("{}/v1/checkouts", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, JSON_API)
            .header(reqwest::header::CONTENT_TYPE, JSON_API)
            .body(body.to_string())
            .send()
            .await?;
        let checkout: CheckoutResponse = ensure_success(response).await?.json().await?;

        tracing::info!(
            user_id = request.user_id,
            package = %request.package,
            checkout_id = %checkout.data.id,
            "Lemon Squeezy checkout created"
        );
        Ok(CheckoutSession {
            provider: ProviderKind::LemonSqueezy,
            id: checkout.data.id,
            url: checkout.data.attributes.url,
        })
    }
}

/// JSON:API body for `POST /v1/checkouts`.
fn checkout_body(config: &LemonSqueezyConfig, request: &CheckoutRequest) -> serde_json::Value {
    let mut checkout_data = serde_json::json!({
        "custom": {
            "user_id": request.user_id.to_string(),
            "package": request.package.as_str(),
        }
    });
    if let Some(email) = &request.email {
        checkout_data["email"] = serde_json::Value::String(email.clone());
    }

    serde_json::json!({
        "data": {
            "type": "checkouts",
            "attributes": {
                "checkout_data": checkout_data,
                "product_options": { "redirect_url": request.success_url },
            },
            "relationships": {
                "store": { "data": { "type": "stores", "id": config.store_id } },
                "variant": {
                    "data": { "type": "variants", "id": config.variant_for(request.package) }
                },
            },
        }
    })
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Verify an `X-Signature` header: hex HMAC-SHA256 of the raw body.
pub fn verify_signature(header: &str, body: &[u8], secret: &str) -> Result<(), PaymentError> {
    if header.trim().is_empty() {
        return Err(PaymentError::InvalidSignature("missing signature".into()));
    }
    if verify_hmac_sha256_hex(secret.as_bytes(), body, header) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

/// Parse a verified webhook body.
///
/// The package comes from the checkout's custom data, falling back to the
/// ordered variant.
pub fn parse_event(
    body: &[u8],
    config: &LemonSqueezyConfig,
) -> Result<WebhookEvent, PaymentError> {
    let payload: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let event_name = payload["meta"]["event_name"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidPayload("meta.event_name missing".into()))?;
    if event_name != ORDER_CREATED {
        return Ok(WebhookEvent::Ignored {
            event_type: event_name.to_string(),
        });
    }

    let attributes = &payload["data"]["attributes"];
    let status = attributes["status"].as_str().unwrap_or("paid");
    if status != "paid" {
        return Ok(WebhookEvent::Ignored {
            event_type: format!("{ORDER_CREATED} ({status})"),
        });
    }

    let order_id = match &payload["data"]["id"] {
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(PaymentError::InvalidPayload("order id missing".into())),
    };

    let custom = &payload["meta"]["custom_data"];
    let user_id = user_id_from(custom.get("user_id"))?;

    let package = match custom["package"].as_str() {
        Some(p) => p
            .parse::<CreditPackage>()
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?,
        None => {
            let variant = &attributes["first_order_item"]["variant_id"];
            let variant = variant
                .as_i64()
                .map(|v| v.to_string())
                .or_else(|| variant.as_str().map(str::to_string))
                .unwrap_or_default();
            config.package_for_variant(&variant).ok_or_else(|| {
                PaymentError::InvalidPayload(format!("unknown variant '{variant}'"))
            })?
        }
    };

    Ok(WebhookEvent::Purchase(PurchaseEvent {
        provider: ProviderKind::LemonSqueezy,
        event_id: order_id,
        user_id,
        package,
        amount_cents: attributes["total"].as_i64(),
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use roastme_core::hashing::hmac_sha256_hex;
    use serde_json::json;

    use super::*;

    fn config() -> LemonSqueezyConfig {
        LemonSqueezyConfig {
            api_key: "key".into(),
            store_id: "1".into(),
            webhook_secret: "ls_secret".into(),
            variant_starter: "100".into(),
            variant_popular: "200".into(),
            variant_pro: "300".into(),
            api_base: "https://api.lemonsqueezy.com".into(),
        }
    }

    fn order(custom: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "meta": { "event_name": "order_created", "custom_data": custom },
            "data": {
                "id": "9001",
                "type": "orders",
                "attributes": {
                    "status": "paid",
                    "total": 2499,
                    "first_order_item": { "variant_id": 300 }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn signature_is_hex_hmac_of_body() {
        let body = b"{\"meta\":{}}";
        let sig = hmac_sha256_hex(b"ls_secret", body);
        assert!(verify_signature(&sig, body, "ls_secret").is_ok());
        assert_matches!(
            verify_signature(&sig, b"{}", "ls_secret"),
            Err(PaymentError::InvalidSignature(_))
        );
        assert_matches!(
            verify_signature("", body, "ls_secret"),
            Err(PaymentError::InvalidSignature(_))
        );
    }

    #[test]
    fn order_created_becomes_purchase() {
        let body = order(json!({ "user_id": "33", "package": "pro" }));
        assert_eq!(
            parse_event(&body, &config()).unwrap(),
            WebhookEvent::Purchase(PurchaseEvent {
                provider: ProviderKind::LemonSqueezy,
                event_id: "9001".into(),
                user_id: 33,
                package: CreditPackage::Pro,
                amount_cents: Some(2499),
            })
        );
    }

    #[test]
    fn package_falls_back_to_variant() {
        let body = order(json!({ "user_id": 33 }));
        assert_matches!(
            parse_event(&body, &config()),
            Ok(WebhookEvent::Purchase(PurchaseEvent {
                package: CreditPackage::Pro,
                ..
            }))
        );
    }

    #[test]
    fn missing_user_is_invalid() {
        let body = order(json!({ "package": "pro" }));
        assert_matches!(parse_event(&body, &config()), Err(PaymentError::InvalidPayload(_)));
    }

    #[test]
    fn other_events_are_ignored() {
        let body = br#"{"meta":{"event_name":"subscription_created"},"data":{}}"#;
        assert_matches!(
            parse_event(body, &config()),
            Ok(WebhookEvent::Ignored { event_type }) if event_type == "subscription_created"
        );
    }

    #[test]
    fn checkout_body_targets_package_variant() {
        let body = checkout_body(
            &config(),
            &CheckoutRequest {
                user_id: 8,
                package: CreditPackage::Popular,
                email: None,
                success_url: "https://app/ok".into(),
                cancel_url: "https://app/cancel".into(),
            },
        );
        assert_eq!(body["data"]["relationships"]["variant"]["data"]["id"], "200");
        assert_eq!(body["data"]["attributes"]["checkout_data"]["custom"]["user_id"], "8");
        assert!(body["data"]["attributes"]["checkout_data"].get("email").is_none());
    }
}
