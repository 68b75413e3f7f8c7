//! Open Graph preview images.

use roastme_core::generation::GenerationStatus;
use roastme_core::imaging;
use roastme_core::naming::og_image_key;
use roastme_storage::{ObjectStore, StorageError};

use crate::error::PipelineError;
use crate::store::{GenerationJob, GenerationStore};

/// Return the character's OG image, composing and storing it first if it
/// does not exist yet.
pub async fn ensure_og_image(
    store: &dyn GenerationStore,
    objects: &dyn ObjectStore,
    job: &GenerationJob,
) -> Result<Vec<u8>, PipelineError> {
    let key = og_image_key(job.id);
    if job.og_image_url.is_some() {
        match objects.get(&key).await {
            Ok(bytes) => return Ok(bytes),
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(character_id = job.id, "OG image recorded but missing, recomposing");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if job.params.status != GenerationStatus::Completed {
        return Err(PipelineError::Conflict(format!(
            "Character {} has no generated image yet",
            job.id
        )));
    }
    let (Some(model_key), Some(source)) = (&job.params.model_key, &job.source) else {
        return Err(PipelineError::Conflict(format!(
            "Character {} is missing the images needed for a preview",
            job.id
        )));
    };

    let original = objects.get(&source.key).await?;
    let generated = objects.get(model_key).await?;
    let png = tokio::task::spawn_blocking(move || {
        imaging::compose_og_image(&original, &generated)
    })
    .await??;

    let url = objects.put(&key, png.clone(), "image/png").await?;
    store.set_og_image_url(job.id, &url).await?;
    tracing::info!(character_id = job.id, %url, "OG image composed");
    Ok(png)
}
