//! Credit ledger model and DTOs.

use roastme_core::credits::CreditPackage;
use roastme_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `credit_ledger` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditLedgerEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub delta: i32,
    pub reason: String,
    pub reference: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// A verified, provider-agnostic credit purchase from a payment webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPurchase {
    /// `"stripe"` or `"lemonsqueezy"`.
    pub provider: String,
    /// Provider event/order id; the ledger reference is `{provider}:{event_id}`.
    pub event_id: String,
    pub user_id: DbId,
    pub package: CreditPackage,
    pub amount_cents: Option<i64>,
}

impl CreditPurchase {
    pub fn ledger_reference(&self) -> String {
        format!("{}:{}", self.provider, self.event_id)
    }
}

/// Outcome of applying a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Credits were added; carries the new balance.
    Credited { balance: i32 },
    /// This event was already applied earlier.
    Duplicate,
    /// The referenced user does not exist.
    UnknownUser,
}
