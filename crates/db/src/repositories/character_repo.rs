//! Repository for the `characters` table.
//!
//! Every write to `generation_params` is a compare-and-set on the stored
//! status: the update only applies while `generation_params->>'status'`
//! still equals the status the caller read. A `None` result means another
//! writer got there first.

use roastme_core::credits::reasons;
use roastme_core::features::AiFeature;
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::character::{Character, CompletedRenditions, CreateCharacter};
use crate::repositories::credit_ledger_repo::CreditLedgerRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, image_upload_id, slug, style, model_url, thumbnail_url, \
     medium_url, og_title, og_description, og_image_url, features, generation_params, \
     is_public, view_count, like_count, created_at, updated_at";

/// Filter matching characters that appear in the public gallery.
const PUBLIC_FILTER: &str = "is_public AND generation_params->>'status' = 'completed'";

/// Provides CRUD and generation-status operations for characters.
pub struct CharacterRepo;

impl CharacterRepo {
    /// Insert a new character, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCharacter) -> Result<Character, sqlx::Error> {
        let query = format!(
            "INSERT INTO characters (user_id, image_upload_id, slug, style, generation_params)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(input.user_id)
            .bind(input.image_upload_id)
            .bind(&input.slug)
            .bind(&input.style)
            .bind(Json(&input.generation_params))
            .fetch_one(pool)
            .await
    }

    /// Debit `cost` credits from the owner and insert the character in one
    /// transaction.
    ///
    /// Returns `None` (and writes nothing) when the owner's balance is below
    /// `cost`. The debit is recorded in the credit ledger against the new
    /// character's id.
    pub async fn create_with_debit(
        pool: &PgPool,
        input: &CreateCharacter,
        cost: i32,
    ) -> Result<Option<Character>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let debited: Option<i32> = sqlx::query_scalar(
            "UPDATE users SET credits = credits - $2
             WHERE id = $1 AND credits >= $2
             RETURNING credits",
        )
        .bind(input.user_id)
        .bind(cost)
        .fetch_optional(&mut *tx)
        .await?;

        if debited.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO characters (user_id, image_upload_id, slug, style, generation_params)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let character = sqlx::query_as::<_, Character>(&query)
            .bind(input.user_id)
            .bind(input.image_upload_id)
            .bind(&input.slug)
            .bind(&input.style)
            .bind(Json(&input.generation_params))
            .fetch_one(&mut *tx)
            .await?;

        CreditLedgerRepo::record_in_tx(
            &mut tx,
            input.user_id,
            -cost,
            reasons::GENERATION,
            &format!("character:{}", character.id),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(character))
    }

    /// Find a character by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE id = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a character by its SEO slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE slug = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// List a user's characters, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// List gallery characters (public and completed), newest first.
    pub async fn list_public(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters
             WHERE {PUBLIC_FILTER}
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count gallery characters.
    pub async fn count_public(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM characters WHERE {PUBLIC_FILTER}");
        sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await
    }

    // -----------------------------------------------------------------------
    // Generation status (compare-and-set)
    // -----------------------------------------------------------------------

    /// Replace `generation_params` if the stored status still equals
    /// `expected`.
    pub async fn update_generation(
        pool: &PgPool,
        id: DbId,
        expected: GenerationStatus,
        params: &GenerationParams,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET generation_params = $3, generation_updated_at = NOW()
             WHERE id = $1 AND generation_params->>'status' = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(Json(params))
            .fetch_optional(pool)
            .await
    }

    /// Store analysis output alongside updated params (compare-and-set).
    pub async fn record_analysis(
        pool: &PgPool,
        id: DbId,
        expected: GenerationStatus,
        features: &[AiFeature],
        params: &GenerationParams,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET features = $3, generation_params = $4,
                generation_updated_at = NOW()
             WHERE id = $1 AND generation_params->>'status' = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(Json(features))
            .bind(Json(params))
            .fetch_optional(pool)
            .await
    }

    /// Write the generated renditions and the completed params
    /// (compare-and-set).
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        expected: GenerationStatus,
        renditions: &CompletedRenditions,
        params: &GenerationParams,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET
                model_url = $3,
                medium_url = $4,
                thumbnail_url = $5,
                og_title = $6,
                og_description = $7,
                og_image_url = NULL,
                generation_params = $8,
                generation_updated_at = NOW()
             WHERE id = $1 AND generation_params->>'status' = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(&renditions.model_url)
            .bind(&renditions.medium_url)
            .bind(&renditions.thumbnail_url)
            .bind(&renditions.og_title)
            .bind(&renditions.og_description)
            .bind(Json(params))
            .fetch_optional(pool)
            .await
    }

    /// Characters in `status` whose generation state has not been written
    /// since `cutoff`. View and like counters do not count as writes.
    pub async fn list_stale(
        pool: &PgPool,
        status: GenerationStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters
             WHERE generation_params->>'status' = $1 AND generation_updated_at < $2
             ORDER BY generation_updated_at ASC
             LIMIT 100"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(status.as_str())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Presentation fields and counters
    // -----------------------------------------------------------------------

    /// Record the URL of the composed OG image.
    pub async fn set_og_image_url(
        pool: &PgPool,
        id: DbId,
        url: &str,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET og_image_url = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(url)
            .fetch_optional(pool)
            .await
    }

    /// Set `is_public` on a character owned by `user_id`.
    ///
    /// Returns `None` if no such character exists for that owner.
    pub async fn set_visibility(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        is_public: bool,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET is_public = $3
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(user_id)
            .bind(is_public)
            .fetch_optional(pool)
            .await
    }

    /// Increment the view counter, returning the new count.
    pub async fn increment_views(pool: &PgPool, id: DbId) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE characters SET view_count = view_count + 1
             WHERE id = $1
             RETURNING view_count",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Like a character once per user, returning the resulting like count.
    ///
    /// Liking twice is a no-op. Returns `None` if the character is missing.
    pub async fn like(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT like_count FROM characters WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = exists else {
            tx.rollback().await?;
            return Ok(None);
        };

        let inserted = sqlx::query(
            "INSERT INTO character_likes (character_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let count = if inserted > 0 {
            sqlx::query_scalar(
                "UPDATE characters SET like_count = like_count + 1
                 WHERE id = $1
                 RETURNING like_count",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            current
        };

        tx.commit().await?;
        Ok(Some(count))
    }
}
