//! Waitlist signup model.

use roastme_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `waitlist_signups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WaitlistSignup {
    pub id: DbId,
    pub email: String,
    pub source: Option<String>,
    pub created_at: Timestamp,
}
