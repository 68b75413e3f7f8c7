//! Character entity model and DTOs.

use roastme_core::features::AiFeature;
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A character row from the `characters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Character {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub user_id: DbId,
    #[serde(skip_serializing)]
    pub image_upload_id: Option<DbId>,
    pub slug: String,
    pub style: String,
    /// Full-size generated image.
    pub model_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub medium_url: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image_url: Option<String>,
    /// NOT NULL in the database; defaults to `[]`.
    pub features: Json<Vec<AiFeature>>,
    pub generation_params: Json<GenerationParams>,
    pub is_public: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Character {
    pub fn status(&self) -> GenerationStatus {
        self.generation_params.status
    }

    /// Params as stored, for read-modify-write updates.
    pub fn params(&self) -> GenerationParams {
        self.generation_params.0.clone()
    }

    /// Whether `user_id` owns this character.
    pub fn is_owned_by(&self, user_id: DbId) -> bool {
        self.user_id == user_id
    }

    /// Visible to everyone: public and finished.
    pub fn is_publicly_visible(&self) -> bool {
        self.is_public && self.status() == GenerationStatus::Completed
    }
}

/// DTO for creating a new character.
#[derive(Debug, Clone)]
pub struct CreateCharacter {
    pub user_id: DbId,
    pub image_upload_id: Option<DbId>,
    pub slug: String,
    pub style: String,
    pub generation_params: GenerationParams,
}

/// Fields written when a generation completes.
#[derive(Debug, Clone)]
pub struct CompletedRenditions {
    pub model_url: String,
    pub medium_url: String,
    pub thumbnail_url: String,
    pub og_title: String,
    pub og_description: String,
}
