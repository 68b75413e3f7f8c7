use std::time::Duration;

/// AI provider configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API, without trailing slash.
    pub base_url: String,
    pub api_key: String,
    /// Model used for photo analysis (chat completions with image input).
    pub vision_model: String,
    /// Model used for image generation and edits.
    pub image_model: String,
    /// Output size, e.g. `1024x1024`.
    pub image_size: String,
    pub request_timeout: Duration,
}

impl AiConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `AI_API_BASE_URL`         | `https://api.openai.com/v1` |
    /// | `AI_API_KEY`              | (required)                  |
    /// | `AI_VISION_MODEL`         | `gpt-4o`                    |
    /// | `AI_IMAGE_MODEL`          | `gpt-image-1`               |
    /// | `AI_IMAGE_SIZE`           | `1024x1024`                 |
    /// | `AI_REQUEST_TIMEOUT_SECS` | `180`                       |
    pub fn from_env() -> Self {
        let base_url = std::env::var("AI_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into())
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("AI_API_KEY").expect("AI_API_KEY must be set");

        let vision_model = std::env::var("AI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o".into());
        let image_model =
            std::env::var("AI_IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".into());
        let image_size = std::env::var("AI_IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".into());

        let timeout_secs: u64 = std::env::var("AI_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "180".into())
            .parse()
            .expect("AI_REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            base_url,
            api_key,
            vision_model,
            image_model,
            image_size,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
