//! The generation runner.
//!
//! A run starts from an active status (`generating` for the first run,
//! `retrying` after a user retry) and makes up to `max_attempts` attempts.
//! Each attempt bumps the lifetime attempt counter, which also selects the
//! prompt variant, so later attempts use progressively safer prompts. The
//! run ends in `completed`, or in the status's exhausted state (`failed` /
//! `retry_failed`) with the last error recorded.

use std::sync::Arc;

use chrono::Utc;
use roastme_ai::{AiProvider, ImageInput, ImageRequest};
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::imaging::{self, MEDIUM_EDGE, THUMBNAIL_EDGE};
use roastme_core::naming::{extension_for_mime, rendition_key};
use roastme_core::prompt::{build_generation_prompt, truncate_chars, PromptVariant};
use roastme_core::retry::{ErrorClass, RetryDecision, RetryPolicy};
use roastme_core::types::DbId;
use roastme_db::models::character::CompletedRenditions;
use roastme_storage::ObjectStore;
use tokio::task::JoinHandle;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::og;
use crate::store::{GenerationJob, GenerationStore};

/// Maximum length of the OG description.
const OG_DESCRIPTION_LEN: usize = 160;

/// How an attempt that did not error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Completed,
    /// The stored status changed under us; stop without writing.
    Superseded,
}

/// Stored renditions of one generated image.
struct StoredImages {
    model_key: String,
    model_url: String,
    medium_url: String,
    thumbnail_url: String,
}

/// Drives characters through generation.
pub struct Generator {
    store: Arc<dyn GenerationStore>,
    ai: Arc<dyn AiProvider>,
    objects: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
}

impl Generator {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        ai: Arc<dyn AiProvider>,
        objects: Arc<dyn ObjectStore>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            store,
            ai,
            objects,
            policy: RetryPolicy {
                max_attempts: config.max_attempts,
            },
        }
    }

    pub fn store(&self) -> &Arc<dyn GenerationStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Status entry points
    // -----------------------------------------------------------------------

    /// Move a new character from `pending` to `generating`.
    pub async fn begin(&self, id: DbId) -> Result<GenerationParams, PipelineError> {
        self.enter(id, GenerationStatus::Pending, GenerationStatus::Generating)
            .await
    }

    /// Move a failed character to `retrying`.
    ///
    /// Fails with [`PipelineError::Conflict`] unless the character is
    /// currently `failed`; of two concurrent calls at most one succeeds.
    pub async fn request_retry(&self, id: DbId) -> Result<GenerationParams, PipelineError> {
        self.enter(id, GenerationStatus::Failed, GenerationStatus::Retrying)
            .await
    }

    async fn enter(
        &self,
        id: DbId,
        from: GenerationStatus,
        to: GenerationStatus,
    ) -> Result<GenerationParams, PipelineError> {
        let job = self
            .store
            .load(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;
        let mut params = job.params;
        if params.status != from {
            return Err(PipelineError::Conflict(format!(
                "Character {id} is '{}', expected '{from}'",
                params.status
            )));
        }
        params.transition(to, Utc::now())?;

        if !self.store.save_params(id, from, &params).await? {
            return Err(PipelineError::Conflict(format!(
                "Character {id} changed status concurrently"
            )));
        }
        tracing::info!(character_id = id, %from, %to, "Generation status changed");
        Ok(params)
    }

    /// Spawn `begin` followed by a full run.
    pub fn spawn_initial(self: &Arc<Self>, id: DbId) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.begin(id).await {
                Ok(_) => this.run(id).await,
                Err(e) => {
                    tracing::warn!(character_id = id, error = %e, "Generation not started");
                }
            }
        })
    }

    /// Spawn a run for a character already in an active status.
    pub fn spawn_run(self: &Arc<Self>, id: DbId) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(id).await })
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Run attempts until the character completes or the run gives up.
    ///
    /// Never returns an error: failures are recorded on the character, and
    /// storage errors are logged (the sweeper terminates the row later).
    pub async fn run(&self, id: DbId) {
        if let Err(e) = self.run_inner(id).await {
            tracing::error!(character_id = id, error = %e, "Generation run aborted");
        }
    }

    async fn run_inner(&self, id: DbId) -> Result<(), PipelineError> {
        let Some(mut job) = self.store.load(id).await? else {
            tracing::warn!(character_id = id, "Generation run for missing character");
            return Ok(());
        };
        let running = job.params.status;
        if !running.is_active() {
            tracing::debug!(character_id = id, status = %running, "Character not active, skipping run");
            return Ok(());
        }

        let source = match &job.source {
            Some(source) => match self.objects.get(&source.key).await {
                Ok(bytes) => ImageInput {
                    bytes,
                    mime: source.mime.clone(),
                },
                Err(e) => {
                    let message = format!("source photo unavailable: {e}");
                    return self.give_up(&mut job, running, message).await;
                }
            },
            None => {
                return self
                    .give_up(&mut job, running, "source photo missing".into())
                    .await;
            }
        };

        let mut run_attempt = 0u32;
        loop {
            run_attempt += 1;
            let attempt = job.params.begin_attempt();
            if !self.store.save_params(id, running, &job.params).await? {
                tracing::info!(character_id = id, "Generation superseded, stopping");
                return Ok(());
            }
            tracing::info!(
                character_id = id,
                attempt,
                run_attempt,
                variant = job.params.prompt_variant.map(|v| v.as_str()).unwrap_or("standard"),
                "Generation attempt started"
            );

            let error = match self.attempt(&mut job, running, &source, attempt).await {
                Ok(AttemptOutcome::Completed) => return Ok(()),
                Ok(AttemptOutcome::Superseded) => {
                    tracing::info!(character_id = id, "Generation superseded, stopping");
                    return Ok(());
                }
                Err(e) => e,
            };

            let message = error.to_string();
            job.params.record_error(message.clone());
            match self.policy.decide(&message, run_attempt) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        character_id = id,
                        attempt,
                        class = ErrorClass::classify(&message).as_str(),
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Generation attempt failed, retrying"
                    );
                    if !self.store.save_params(id, running, &job.params).await? {
                        return Ok(());
                    }
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return self.give_up(&mut job, running, message).await,
            }
        }
    }

    /// Record `message` and move to the running status's exhausted state.
    async fn give_up(
        &self,
        job: &mut GenerationJob,
        running: GenerationStatus,
        message: String,
    ) -> Result<(), PipelineError> {
        let Some(terminal) = running.exhausted_status() else {
            return Ok(());
        };
        job.params.record_error(message.clone());
        job.params.transition(terminal, Utc::now())?;

        if self.store.save_params(job.id, running, &job.params).await? {
            tracing::error!(
                character_id = job.id,
                attempt = job.params.attempt,
                status = %terminal,
                error = %message,
                "Generation gave up"
            );
        }
        Ok(())
    }

    async fn attempt(
        &self,
        job: &mut GenerationJob,
        running: GenerationStatus,
        source: &ImageInput,
        attempt: u32,
    ) -> Result<AttemptOutcome, PipelineError> {
        let variant = job
            .params
            .prompt_variant
            .unwrap_or_else(|| PromptVariant::for_attempt(attempt));

        let needs_analysis = job.features.is_empty() && job.params.roast.is_none();
        if needs_analysis && variant.feature_budget() > 0 {
            let analysis = self.ai.analyze_features(source).await?;
            job.features = analysis.features;
            job.params.roast = Some(analysis.roast).filter(|r| !r.trim().is_empty());
            if !self
                .store
                .save_analysis(job.id, running, &job.features, &job.params)
                .await?
            {
                return Ok(AttemptOutcome::Superseded);
            }
        }

        let prompt = build_generation_prompt(
            job.params.style,
            &job.features,
            job.params.roast.as_deref(),
            variant,
        );
        let reference = (variant != PromptVariant::Minimal).then(|| source.clone());
        let image = self
            .ai
            .generate_image(&ImageRequest { prompt, reference })
            .await?;

        let stored = self.store_renditions(job.id, attempt, image.bytes).await?;

        // The in-memory params stay active until the completion write lands,
        // so a failed write is retried from the running status.
        let mut done = job.params.clone();
        done.model_key = Some(stored.model_key);
        done.transition(GenerationStatus::Completed, Utc::now())?;
        let renditions = CompletedRenditions {
            model_url: stored.model_url,
            medium_url: stored.medium_url,
            thumbnail_url: stored.thumbnail_url,
            og_title: format!("Roasted as {}", done.style.label_with_article()),
            og_description: og_description(done.roast.as_deref()),
        };
        if !self
            .store
            .complete(job.id, running, &renditions, &done)
            .await?
        {
            return Ok(AttemptOutcome::Superseded);
        }
        job.params = done;
        tracing::info!(character_id = job.id, attempt, "Generation completed");

        job.og_image_url = None;
        if let Err(e) = og::ensure_og_image(&*self.store, &*self.objects, job).await {
            tracing::warn!(character_id = job.id, error = %e, "OG image composition failed");
        }
        Ok(AttemptOutcome::Completed)
    }

    /// Store the full image plus medium and thumbnail JPEG renditions.
    async fn store_renditions(
        &self,
        id: DbId,
        attempt: u32,
        bytes: Vec<u8>,
    ) -> Result<StoredImages, PipelineError> {
        let (meta, medium, thumbnail, bytes) = tokio::task::spawn_blocking(move || {
            let meta = imaging::inspect(&bytes)?;
            let medium = imaging::render_jpeg(&bytes, MEDIUM_EDGE)?;
            let thumbnail = imaging::render_jpeg(&bytes, THUMBNAIL_EDGE)?;
            Ok::<_, roastme_core::error::CoreError>((meta, medium, thumbnail, bytes))
        })
        .await??;

        let model_key = rendition_key(id, attempt, "full", extension_for_mime(meta.mime));
        let model_url = self.objects.put(&model_key, bytes, meta.mime).await?;
        let medium_url = self
            .objects
            .put(&rendition_key(id, attempt, "medium", "jpg"), medium, "image/jpeg")
            .await?;
        let thumbnail_url = self
            .objects
            .put(
                &rendition_key(id, attempt, "thumbnail", "jpg"),
                thumbnail,
                "image/jpeg",
            )
            .await?;

        Ok(StoredImages {
            model_key,
            model_url,
            medium_url,
            thumbnail_url,
        })
    }
}

fn og_description(roast: Option<&str>) -> String {
    match roast.map(str::trim).filter(|r| !r.is_empty()) {
        Some(roast) => truncate_chars(roast, OG_DESCRIPTION_LEN).to_string(),
        None => "An AI roast, immortalised as a collectible figurine.".to_string(),
    }
}
