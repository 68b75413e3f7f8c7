//! Persistence seam for the generation runner.

use async_trait::async_trait;
use roastme_core::features::AiFeature;
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::types::{DbId, Timestamp};
use roastme_db::models::character::{Character, CompletedRenditions};
use roastme_db::repositories::{CharacterRepo, ImageUploadRepo};
use roastme_db::DbPool;

use crate::error::PipelineError;

/// Location of the uploaded source photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub key: String,
    pub mime: String,
}

/// Everything the runner needs to know about one character.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: DbId,
    pub slug: String,
    pub features: Vec<AiFeature>,
    pub params: GenerationParams,
    pub source: Option<SourceImage>,
    pub og_image_url: Option<String>,
}

impl GenerationJob {
    fn from_character(character: Character, source: Option<SourceImage>) -> Self {
        Self {
            id: character.id,
            slug: character.slug,
            features: character.features.0,
            params: character.generation_params.0,
            source,
            og_image_url: character.og_image_url,
        }
    }
}

/// Storage operations used by [`crate::Generator`] and the sweeper.
///
/// Every write that touches `params` is a compare-and-set against
/// `expected`: `Ok(false)` means the stored status had already moved on and
/// nothing was written.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn load(&self, id: DbId) -> Result<Option<GenerationJob>, PipelineError>;

    async fn save_params(
        &self,
        id: DbId,
        expected: GenerationStatus,
        params: &GenerationParams,
    ) -> Result<bool, PipelineError>;

    async fn save_analysis(
        &self,
        id: DbId,
        expected: GenerationStatus,
        features: &[AiFeature],
        params: &GenerationParams,
    ) -> Result<bool, PipelineError>;

    async fn complete(
        &self,
        id: DbId,
        expected: GenerationStatus,
        renditions: &CompletedRenditions,
        params: &GenerationParams,
    ) -> Result<bool, PipelineError>;

    /// Characters in `status` whose generation state was last written
    /// before `cutoff`. Sources are not loaded.
    async fn list_stale(
        &self,
        status: GenerationStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<GenerationJob>, PipelineError>;

    async fn set_og_image_url(&self, id: DbId, url: &str) -> Result<(), PipelineError>;
}

/// [`GenerationStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgGenerationStore {
    pool: DbPool,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn load(&self, id: DbId) -> Result<Option<GenerationJob>, PipelineError> {
        let Some(character) = CharacterRepo::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        let source = match character.image_upload_id {
            Some(upload_id) => ImageUploadRepo::find_by_id(&self.pool, upload_id)
                .await?
                .map(|u| SourceImage {
                    key: u.storage_key,
                    mime: u.mime_type,
                }),
            None => None,
        };
        Ok(Some(GenerationJob::from_character(character, source)))
    }

    async fn save_params(
        &self,
        id: DbId,
        expected: GenerationStatus,
        params: &GenerationParams,
    ) -> Result<bool, PipelineError> {
        Ok(CharacterRepo::update_generation(&self.pool, id, expected, params)
            .await?
            .is_some())
    }

    async fn save_analysis(
        &self,
        id: DbId,
        expected: GenerationStatus,
        features: &[AiFeature],
        params: &GenerationParams,
    ) -> Result<bool, PipelineError> {
        Ok(
            CharacterRepo::record_analysis(&self.pool, id, expected, features, params)
                .await?
                .is_some(),
        )
    }

    async fn complete(
        &self,
        id: DbId,
        expected: GenerationStatus,
        renditions: &CompletedRenditions,
        params: &GenerationParams,
    ) -> Result<bool, PipelineError> {
        Ok(
            CharacterRepo::complete(&self.pool, id, expected, renditions, params)
                .await?
                .is_some(),
        )
    }

    async fn list_stale(
        &self,
        status: GenerationStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<GenerationJob>, PipelineError> {
        let characters = CharacterRepo::list_stale(&self.pool, status, cutoff).await?;
        Ok(characters
            .into_iter()
            .map(|c| GenerationJob::from_character(c, None))
            .collect())
    }

    async fn set_og_image_url(&self, id: DbId, url: &str) -> Result<(), PipelineError> {
        CharacterRepo::set_og_image_url(&self.pool, id, url).await?;
        Ok(())
    }
}
