use roastme_core::error::CoreError;
use roastme_core::types::DbId;
use roastme_storage::StorageError;

/// Errors from the generation pipeline.
///
/// Only [`crate::Generator::begin`] and [`crate::Generator::request_retry`]
/// return these to callers; the background run records failures on the
/// character instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Character {0} not found")]
    NotFound(DbId),

    /// The stored status was not the one the caller expected.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ai(#[from] roastme_ai::AiError),

    #[error("Image processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
