//! Repository for the `users` table and balance-changing operations.

use roastme_core::credits::{reasons, PlanTier};
use roastme_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::credit::{CreditPurchase, PurchaseOutcome};
use crate::models::user::User;
use crate::repositories::credit_ledger_repo::CreditLedgerRepo;

const COLUMNS: &str =
    "id, auth_subject, anonymous_session, email, credits, plan, created_at, updated_at";

/// Result of merging an anonymous account into an authenticated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub characters_moved: u64,
    pub credits_moved: i32,
    /// Authenticated user's balance after the merge.
    pub balance: i32,
}

/// Provides lookup, provisioning and credit operations for users.
pub struct UserRepo;

impl UserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_subject(pool: &PgPool, subject: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE auth_subject = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(subject)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_session(pool: &PgPool, session: Uuid) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE anonymous_session = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(session)
            .fetch_optional(pool)
            .await
    }

    /// Return the user owning an anonymous session, creating it on first
    /// sight with `initial_credits`.
    pub async fn find_or_create_anonymous(
        pool: &PgPool,
        session: Uuid,
        initial_credits: i32,
    ) -> Result<User, sqlx::Error> {
        if let Some(user) = Self::find_by_session(pool, session).await? {
            return Ok(user);
        }

        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO users (anonymous_session, credits) VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_users_anonymous_session DO NOTHING
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(session)
            .bind(initial_credits)
            .fetch_optional(&mut *tx)
            .await?;
        Self::finish_provisioning(tx, created, initial_credits).await?;

        // A concurrent request may have won the insert race.
        Self::find_by_session(pool, session)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Return the user for an authenticated subject, creating it on first
    /// sight with `initial_credits`. A changed email is written back.
    pub async fn find_or_create_authenticated(
        pool: &PgPool,
        subject: &str,
        email: Option<&str>,
        initial_credits: i32,
    ) -> Result<User, sqlx::Error> {
        if let Some(user) = Self::find_by_subject(pool, subject).await? {
            if email.is_some() && user.email.as_deref() != email {
                let query =
                    format!("UPDATE users SET email = $2 WHERE id = $1 RETURNING {COLUMNS}");
                return sqlx::query_as::<_, User>(&query)
                    .bind(user.id)
                    .bind(email)
                    .fetch_one(pool)
                    .await;
            }
            return Ok(user);
        }

        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO users (auth_subject, email, credits) VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_users_auth_subject DO NOTHING
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(subject)
            .bind(email)
            .bind(initial_credits)
            .fetch_optional(&mut *tx)
            .await?;
        Self::finish_provisioning(tx, created, initial_credits).await?;

        Self::find_by_subject(pool, subject)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Write the signup grant for a freshly inserted user and commit.
    async fn finish_provisioning(
        mut tx: Transaction<'_, Postgres>,
        created: Option<User>,
        initial_credits: i32,
    ) -> Result<(), sqlx::Error> {
        if let Some(user) = &created {
            if initial_credits > 0 {
                CreditLedgerRepo::record_in_tx(
                    &mut tx,
                    user.id,
                    initial_credits,
                    reasons::SIGNUP_GRANT,
                    &format!("user:{}", user.id),
                    None,
                )
                .await?;
            }
            tracing::info!(user_id = user.id, anonymous = user.is_anonymous(), "User provisioned");
        }
        tx.commit().await
    }

    /// Credit a verified purchase exactly once.
    ///
    /// The ledger's unique `(reason, reference)` constraint makes a replayed
    /// webhook a no-op that reports [`PurchaseOutcome::Duplicate`]. The plan
    /// tier is raised to the package's tier, never lowered.
    pub async fn apply_purchase(
        pool: &PgPool,
        purchase: &CreditPurchase,
    ) -> Result<PurchaseOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let plan: Option<String> =
            sqlx::query_scalar("SELECT plan FROM users WHERE id = $1 FOR UPDATE")
                .bind(purchase.user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(plan) = plan else {
            tx.rollback().await?;
            return Ok(PurchaseOutcome::UnknownUser);
        };

        let metadata = serde_json::json!({
            "provider": purchase.provider,
            "package": purchase.package.as_str(),
            "amount_cents": purchase.amount_cents,
        });
        let recorded = CreditLedgerRepo::record_in_tx(
            &mut tx,
            purchase.user_id,
            purchase.package.credits(),
            reasons::PURCHASE,
            &purchase.ledger_reference(),
            Some(metadata),
        )
        .await?;
        if !recorded {
            tx.rollback().await?;
            return Ok(PurchaseOutcome::Duplicate);
        }

        let tier = PlanTier::from_db(&plan).upgraded_by(purchase.package);
        let balance: i32 = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $2, plan = $3
             WHERE id = $1
             RETURNING credits",
        )
        .bind(purchase.user_id)
        .bind(purchase.package.credits())
        .bind(tier.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PurchaseOutcome::Credited { balance })
    }

    /// Merge the anonymous user owning `session` into `target_id`.
    ///
    /// Characters, uploads and likes move to the target, plus whatever is
    /// left of the credits the anonymous user bought. The signup grant is
    /// spent first and never moves. The anonymous row is then deleted. Returns `None` if the session has
    /// no anonymous user (already claimed, or never used).
    pub async fn claim_anonymous(
        pool: &PgPool,
        session: Uuid,
        target_id: DbId,
    ) -> Result<Option<ClaimOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let source: Option<(DbId, i32)> = sqlx::query_as(
            "SELECT id, credits FROM users
             WHERE anonymous_session = $1 AND auth_subject IS NULL AND id <> $2
             FOR UPDATE",
        )
        .bind(session)
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((source_id, balance_left)) = source else {
            tx.rollback().await?;
            return Ok(None);
        };

        let purchased: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM credit_ledger
             WHERE user_id = $1 AND reason = $2",
        )
        .bind(source_id)
        .bind(reasons::PURCHASE)
        .fetch_one(&mut *tx)
        .await?;
        let credits = transferable_credits(balance_left, purchased);

        let characters_moved = sqlx::query("UPDATE characters SET user_id = $2 WHERE user_id = $1")
            .bind(source_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE image_uploads SET user_id = $2 WHERE user_id = $1")
            .bind(source_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        // Likes the target already holds stay; the rest move over.
        sqlx::query(
            "UPDATE character_likes l SET user_id = $2
             WHERE l.user_id = $1
               AND NOT EXISTS (
                   SELECT 1 FROM character_likes t
                   WHERE t.character_id = l.character_id AND t.user_id = $2
               )",
        )
        .bind(source_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        if credits > 0 {
            CreditLedgerRepo::record_in_tx(
                &mut tx,
                target_id,
                credits,
                reasons::CLAIM,
                &format!("user:{source_id}"),
                None,
            )
            .await?;
        }

        let balance: i32 = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $2 WHERE id = $1 RETURNING credits",
        )
        .bind(target_id)
        .bind(credits)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            source_id,
            target_id,
            characters_moved,
            credits_moved = credits,
            "Anonymous user claimed"
        );

        Ok(Some(ClaimOutcome {
            characters_moved,
            credits_moved: credits,
            balance,
        }))
    }
}

/// Credits an anonymous balance may carry into a claim: only what remains of
/// purchased credits.
fn transferable_credits(balance: i32, purchased: i64) -> i32 {
    let purchased = i32::try_from(purchased.max(0)).unwrap_or(i32::MAX);
    balance.clamp(0, purchased)
}
