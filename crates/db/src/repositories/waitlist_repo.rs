//! Repository for the `waitlist_signups` table.

use sqlx::PgPool;

use crate::models::waitlist::WaitlistSignup;

const COLUMNS: &str = "id, email, source, created_at";

pub struct WaitlistRepo;

impl WaitlistRepo {
    /// Add an email to the waitlist.
    ///
    /// Signing up twice is not an error: the second call returns `false`
    /// and leaves the original row untouched.
    pub async fn signup(
        pool: &PgPool,
        email: &str,
        source: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO waitlist_signups (email, source) VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_waitlist_signups_email DO NOTHING",
        )
        .bind(email)
        .bind(source)
        .execute(pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<WaitlistSignup>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM waitlist_signups WHERE email = $1");
        sqlx::query_as::<_, WaitlistSignup>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}
