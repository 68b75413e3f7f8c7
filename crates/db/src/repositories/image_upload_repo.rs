//! Repository for the `image_uploads` table.

use roastme_core::types::DbId;
use sqlx::PgPool;

use crate::models::image_upload::{CreateImageUpload, ImageUpload};

const COLUMNS: &str =
    "id, user_id, storage_key, url, size_bytes, mime_type, width, height, created_at";

/// Provides create and lookup operations for uploaded source photos.
pub struct ImageUploadRepo;

impl ImageUploadRepo {
    /// Record a stored upload, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImageUpload,
    ) -> Result<ImageUpload, sqlx::Error> {
        let query = format!(
            "INSERT INTO image_uploads
                (user_id, storage_key, url, size_bytes, mime_type, width, height)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageUpload>(&query)
            .bind(input.user_id)
            .bind(&input.storage_key)
            .bind(&input.url)
            .bind(input.size_bytes)
            .bind(&input.mime_type)
            .bind(input.width)
            .bind(input.height)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ImageUpload>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM image_uploads WHERE id = $1");
        sqlx::query_as::<_, ImageUpload>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
