//! Payment provider webhooks.
//!
//! Signatures are checked against the raw body before it is parsed. A
//! verified purchase is credited once per provider object; redeliveries
//! answer 200 so the provider stops retrying.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use roastme_db::models::credit::{CreditPurchase, PurchaseOutcome};
use roastme_db::repositories::UserRepo;
use roastme_payments::{lemonsqueezy, stripe, PaymentError, WebhookEvent};
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    /// `credited`, `duplicate`, `unknown_user` or `ignored`.
    pub outcome: &'static str,
}

/// POST /api/v1/webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let config = state
        .payments
        .stripe
        .as_ref()
        .ok_or(PaymentError::NotConfigured("stripe"))?;
    let signature = header_str(&headers, "stripe-signature");
    stripe::verify_signature(
        signature,
        &body,
        &config.webhook_secret,
        chrono::Utc::now().timestamp(),
    )?;

    let event = stripe::parse_event(&body)?;
    handle_event(&state, event).await
}

/// POST /api/v1/webhooks/lemonsqueezy
pub async fn lemonsqueezy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let config = state
        .payments
        .lemonsqueezy
        .as_ref()
        .ok_or(PaymentError::NotConfigured("lemonsqueezy"))?;
    let signature = header_str(&headers, "x-signature");
    lemonsqueezy::verify_signature(signature, &body, &config.webhook_secret)?;

    let event = lemonsqueezy::parse_event(&body, config)?;
    handle_event(&state, event).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn handle_event(state: &AppState, event: WebhookEvent) -> AppResult<Json<WebhookAck>> {
    let purchase = match event {
        WebhookEvent::Ignored { event_type } => {
            tracing::debug!(event_type = %event_type, "Webhook event ignored");
            return Ok(ack("ignored"));
        }
        WebhookEvent::Purchase(p) => CreditPurchase {
            provider: p.provider.as_str().to_string(),
            event_id: p.event_id,
            user_id: p.user_id,
            package: p.package,
            amount_cents: p.amount_cents,
        },
    };

    let outcome = UserRepo::apply_purchase(&state.pool, &purchase).await?;
    let label = match outcome {
        PurchaseOutcome::Credited { balance } => {
            tracing::info!(
                user_id = purchase.user_id,
                package = %purchase.package,
                reference = %purchase.ledger_reference(),
                balance,
                "Purchase credited"
            );
            "credited"
        }
        PurchaseOutcome::Duplicate => {
            tracing::info!(reference = %purchase.ledger_reference(), "Duplicate purchase webhook");
            "duplicate"
        }
        PurchaseOutcome::UnknownUser => {
            tracing::warn!(
                user_id = purchase.user_id,
                reference = %purchase.ledger_reference(),
                "Purchase for unknown user"
            );
            "unknown_user"
        }
    };
    Ok(ack(label))
}

fn ack(outcome: &'static str) -> Json<WebhookAck> {
    Json(WebhookAck {
        received: true,
        outcome,
    })
}
