//! Periodic sweep of abandoned generations.
//!
//! A generation whose runner died (crash, redeploy) would stay `generating`
//! or `retrying` forever. Every [`GenerationConfig::sweep_interval`] this
//! task moves active characters untouched for `stale_after` to their
//! exhausted status with a timeout error.

use std::sync::Arc;

use chrono::Utc;
use roastme_core::generation::GenerationStatus;
use roastme_core::types::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::store::GenerationStore;

/// Error recorded on swept characters.
pub const TIMEOUT_ERROR: &str = "generation timed out";

/// Fail every active generation whose state was last written before `now - stale_after`.
///
/// Returns how many characters were moved. Rows that changed status while
/// being swept are skipped.
pub async fn sweep_once(
    store: &dyn GenerationStore,
    stale_after: chrono::Duration,
    now: Timestamp,
) -> Result<usize, PipelineError> {
    let cutoff = now - stale_after;
    let mut swept = 0;

    for status in [GenerationStatus::Generating, GenerationStatus::Retrying] {
        let Some(terminal) = status.exhausted_status() else {
            continue;
        };
        for mut job in store.list_stale(status, cutoff).await? {
            job.params.record_error(TIMEOUT_ERROR);
            job.params.transition(terminal, now)?;
            if store.save_params(job.id, status, &job.params).await? {
                tracing::warn!(
                    character_id = job.id,
                    from = %status,
                    to = %terminal,
                    "Stale generation swept"
                );
                swept += 1;
            }
        }
    }
    Ok(swept)
}

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn GenerationStore>,
    config: GenerationConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        stale_minutes = config.stale_after.num_minutes(),
        interval_secs = config.sweep_interval.as_secs(),
        "Stale generation sweeper started"
    );

    let mut interval = tokio::time::interval(config.sweep_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale generation sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&*store, config.stale_after, Utc::now()).await {
                    Ok(0) => tracing::debug!("Sweeper: no stale generations"),
                    Ok(swept) => tracing::info!(swept, "Sweeper: failed stale generations"),
                    Err(e) => tracing::error!(error = %e, "Sweeper: sweep failed"),
                }
            }
        }
    }
}
