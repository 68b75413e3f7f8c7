//! AI provider integration.
//!
//! Two calls make up one character generation: a vision call that describes
//! the uploaded photo as exaggeratable features plus a roast line, and an
//! image call that renders the figurine. [`AiProvider`] is the seam the
//! generation pipeline depends on; [`client::OpenAiClient`] implements it
//! against any OpenAI-compatible HTTP API.

pub mod client;
pub mod config;
pub mod error;

use async_trait::async_trait;
use roastme_core::features::FeatureAnalysis;

pub use client::OpenAiClient;
pub use config::AiConfig;
pub use error::AiError;

/// An image held in memory with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Request for one image generation.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// Reference photo for edit-style generation. `None` generates from the
    /// prompt alone.
    pub reference: Option<ImageInput>,
}

/// A generated image.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// Prompt as rewritten by the provider, when it reports one.
    pub revised_prompt: Option<String>,
}

/// External AI service used by the generation pipeline.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Describe the person in `image` as features and a roast line.
    async fn analyze_features(&self, image: &ImageInput) -> Result<FeatureAnalysis, AiError>;

    /// Render an image for `request`.
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError>;
}
