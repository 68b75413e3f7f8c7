/// Errors from the AI provider layer.
///
/// The `Display` output is what the generation pipeline classifies for
/// retries, so API errors keep the status code and raw body.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// The HTTP request failed (network, DNS, TLS).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The request hit the client timeout before a response arrived.
    #[error("AI request timed out: {0}")]
    Timeout(reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("AI API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx response that could not be used.
    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout(err)
        } else {
            AiError::Request(err)
        }
    }
}

impl AiError {
    /// HTTP status reported by the provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::Api { status, .. } => Some(*status),
            AiError::Request(e) => e.status().map(|s| s.as_u16()),
            AiError::Timeout(_) | AiError::InvalidResponse(_) => None,
        }
    }
}
