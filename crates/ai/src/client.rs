//! HTTP client for OpenAI-compatible vision and image endpoints.
//!
//! Uses `POST /chat/completions` (JSON mode, image passed as a data URL) for
//! analysis, `POST /images/edits` when a reference photo is supplied and
//! `POST /images/generations` otherwise.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use roastme_core::features::FeatureAnalysis;
use roastme_core::naming::extension_for_mime;
use roastme_core::prompt::ANALYSIS_PROMPT;
use serde::Deserialize;

use crate::config::AiConfig;
use crate::error::AiError;
use crate::{AiProvider, GeneratedImage, ImageInput, ImageRequest};

/// HTTP client for one OpenAI-compatible provider.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: AiConfig,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// Where the generated image bytes are.
#[derive(Debug, PartialEq, Eq)]
enum ImagePayload {
    Inline(Vec<u8>),
    Remote(String),
}

impl OpenAiClient {
    /// Create a client with its own connection pool and the configured
    /// request timeout.
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn generate_from_prompt(&self, prompt: &str) -> Result<reqwest::Response, AiError> {
        let body = serde_json::json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "size": self.config.image_size,
            "n": 1,
        });
        Ok(self
            .client
            .post(self.url("/images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?)
    }

    async fn edit_reference(
        &self,
        prompt: &str,
        reference: &ImageInput,
    ) -> Result<reqwest::Response, AiError> {
        let file = Part::bytes(reference.bytes.clone())
            .file_name(format!("reference.{}", extension_for_mime(&reference.mime)))
            .mime_str(&reference.mime)?;
        let form = Form::new()
            .text("model", self.config.image_model.clone())
            .text("prompt", prompt.to_string())
            .text("size", self.config.image_size.clone())
            .text("n", "1")
            .part("image", file);

        Ok(self
            .client
            .post(self.url("/images/edits"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?)
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), AiError> {
        let response = ensure_success(self.client.get(url).send().await?).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), mime))
    }
}

#[async_trait]
impl AiProvider for OpenAiClient {
    async fn analyze_features(&self, image: &ImageInput) -> Result<FeatureAnalysis, AiError> {
        let body = analysis_request(&self.config.vision_model, image);
        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let chat: ChatResponse = parse_response(response).await?;

        let content = chat_content(chat)?;
        let analysis = FeatureAnalysis::parse(&content)
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        tracing::debug!(
            features = analysis.features.len(),
            has_roast = !analysis.roast.is_empty(),
            "Photo analysed"
        );
        Ok(analysis)
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError> {
        let response = match &request.reference {
            Some(reference) => self.edit_reference(&request.prompt, reference).await?,
            None => self.generate_from_prompt(&request.prompt).await?,
        };
        let images: ImagesResponse = parse_response(response).await?;
        let datum = images
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("image response contained no data".into()))?;
        let revised_prompt = datum.revised_prompt.clone();

        let (bytes, mime) = match image_payload(datum)? {
            ImagePayload::Inline(bytes) => (bytes, "image/png".to_string()),
            ImagePayload::Remote(url) => self.download(&url).await?,
        };
        tracing::debug!(size = bytes.len(), %mime, "Image generated");

        Ok(GeneratedImage {
            bytes,
            mime,
            revised_prompt,
        })
    }
}

// ---- private helpers ----

/// Chat completion body for photo analysis.
fn analysis_request(model: &str, image: &ImageInput) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": ANALYSIS_PROMPT },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": "Analyse this photo and reply with JSON only." },
                    { "type": "image_url", "image_url": { "url": data_url(image) } },
                ],
            },
        ],
    })
}

fn data_url(image: &ImageInput) -> String {
    format!("data:{};base64,{}", image.mime, BASE64.encode(&image.bytes))
}

fn chat_content(chat: ChatResponse) -> Result<String, AiError> {
    let message = chat
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| AiError::InvalidResponse("chat response contained no choices".into()))?;

    if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(AiError::InvalidResponse(format!(
            "analysis refused by safety system: {refusal}"
        )));
    }
    message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AiError::InvalidResponse("chat response was empty".into()))
}

fn image_payload(datum: ImageDatum) -> Result<ImagePayload, AiError> {
    if let Some(b64) = datum.b64_json {
        let bytes = BASE64
            .decode(b64.trim())
            .map_err(|e| AiError::InvalidResponse(format!("bad base64 image: {e}")))?;
        return Ok(ImagePayload::Inline(bytes));
    }
    datum
        .url
        .map(ImagePayload::Remote)
        .ok_or_else(|| AiError::InvalidResponse("image response had neither b64_json nor url".into()))
}

/// Return the response unchanged on success, or [`AiError::Api`] with the
/// status and body text on failure.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(AiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AiError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use roastme_core::retry::ErrorClass;

    use super::*;

    fn image() -> ImageInput {
        ImageInput {
            bytes: b"abc".to_vec(),
            mime: "image/jpeg".into(),
        }
    }

    #[test]
    fn data_url_embeds_mime_and_base64() {
        assert_eq!(data_url(&image()), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn analysis_request_uses_json_mode() {
        let body = analysis_request("gpt-4o", &image());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,YWJj"
        );
    }

    #[test]
    fn chat_content_surfaces_refusals_as_content_policy() {
        let chat: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
        }))
        .unwrap();
        let err = chat_content(chat).unwrap_err();
        assert_eq!(ErrorClass::classify(&err.to_string()), ErrorClass::ContentPolicy);
    }

    #[test]
    fn chat_content_rejects_empty_choices() {
        let chat = ChatResponse { choices: vec![] };
        assert_matches!(chat_content(chat), Err(AiError::InvalidResponse(_)));
    }

    #[test]
    fn image_payload_prefers_inline_data() {
        let datum: ImageDatum = serde_json::from_value(serde_json::json!({
            "b64_json": "YWJj",
            "url": "https://example.com/x.png"
        }))
        .unwrap();
        assert_eq!(image_payload(datum).unwrap(), ImagePayload::Inline(b"abc".to_vec()));

        let datum: ImageDatum =
            serde_json::from_value(serde_json::json!({ "url": "https://example.com/x.png" }))
                .unwrap();
        assert_eq!(
            image_payload(datum).unwrap(),
            ImagePayload::Remote("https://example.com/x.png".into())
        );
    }

    #[test]
    fn api_error_display_keeps_status_for_classification() {
        let err = AiError::Api {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "AI API error (429): slow down");
        assert_eq!(err.status(), Some(429));
        assert_eq!(ErrorClass::classify(&err.to_string()), ErrorClass::RateLimit);
    }
}
