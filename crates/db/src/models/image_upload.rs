//! Uploaded source photo model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use roastme_core::types::{DbId, Timestamp};

/// A row from the `image_uploads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageUpload {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub user_id: DbId,
    pub storage_key: String,
    pub url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub created_at: Timestamp,
}

/// DTO for recording a new upload.
#[derive(Debug, Clone)]
pub struct CreateImageUpload {
    pub user_id: DbId,
    pub storage_key: String,
    pub url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
}
