//! Payment provider integration: checkout session creation and webhook
//! verification for Stripe and Lemon Squeezy.
//!
//! Webhooks are verified against the raw request body before anything is
//! parsed. A verified event becomes a provider-agnostic [`PurchaseEvent`]
//! that the API credits exactly once.

pub mod config;
pub mod lemonsqueezy;
pub mod stripe;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use roastme_core::credits::CreditPackage;
use roastme_core::types::DbId;
use serde::Serialize;

pub use config::{LemonSqueezyConfig, PaymentConfig, StripeConfig};
pub use lemonsqueezy::LemonSqueezyClient;
pub use stripe::StripeClient;

/// Errors from the payments layer.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Payment API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Payment provider not configured: {0}")]
    NotConfigured(&'static str),
}

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    LemonSqueezy,
}

impl ProviderKind {
    /// Identifier used in ledger references and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::LemonSqueezy => "lemonsqueezy",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "lemonsqueezy" => Ok(ProviderKind::LemonSqueezy),
            other => Err(format!("unknown payment provider '{other}'")),
        }
    }
}

/// Input for a hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: DbId,
    pub package: CreditPackage,
    pub email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session; the browser is redirected to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub provider: ProviderKind,
    pub id: String,
    pub url: String,
}

/// A verified, paid credit purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub provider: ProviderKind,
    /// Provider id of the paid object (Stripe checkout session, Lemon
    /// Squeezy order). Stable across webhook redeliveries.
    pub event_id: String,
    pub user_id: DbId,
    pub package: CreditPackage,
    pub amount_cents: Option<i64>,
}

/// Outcome of parsing a verified webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Purchase(PurchaseEvent),
    /// A well-formed event this service does not act on.
    Ignored { event_type: String },
}

/// Hosted checkout provider.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_checkout(&self, request: &CheckoutRequest)
        -> Result<CheckoutSession, PaymentError>;
}

/// Build the checkout provider selected by `PAYMENT_PROVIDER`.
pub fn checkout_provider(config: &PaymentConfig) -> Result<Arc<dyn CheckoutProvider>, PaymentError> {
    let client = reqwest::Client::new();
    match config.provider {
        ProviderKind::Stripe => {
            let stripe = config
                .stripe
                .clone()
                .ok_or(PaymentError::NotConfigured("stripe"))?;
            Ok(Arc::new(StripeClient::new(client, stripe)))
        }
        ProviderKind::LemonSqueezy => {
            let ls = config
                .lemonsqueezy
                .clone()
                .ok_or(PaymentError::NotConfigured("lemonsqueezy"))?;
            Ok(Arc::new(LemonSqueezyClient::new(client, ls)))
        }
    }
}

/// Read a user id that providers echo back either as a JSON number or as a
/// string.
pub(crate) fn user_id_from(value: Option<&serde_json::Value>) -> Result<DbId, PaymentError> {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .filter(|id| *id > 0)
        .ok_or_else(|| PaymentError::InvalidPayload("missing or invalid user_id".into()))
}

/// Return the response unchanged on success, or [`PaymentError::Api`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(PaymentError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
