//! Repository for the append-only `credit_ledger` table.

use roastme_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::credit::CreditLedgerEntry;

const COLUMNS: &str = "id, user_id, delta, reason, reference, metadata, created_at";

/// Records and lists credit movements.
pub struct CreditLedgerRepo;

impl CreditLedgerRepo {
    /// Insert a ledger row inside an open transaction.
    ///
    /// Returns `false` when `(reason, reference)` already exists, in which
    /// case nothing was written.
    pub async fn record_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: DbId,
        delta: i32,
        reason: &str,
        reference: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO credit_ledger (user_id, delta, reason, reference, metadata)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_credit_ledger_reason_reference DO NOTHING",
        )
        .bind(user_id)
        .bind(delta)
        .bind(reason)
        .bind(reference)
        .bind(metadata)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    /// A user's ledger, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<CreditLedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_ledger
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, CreditLedgerEntry>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
