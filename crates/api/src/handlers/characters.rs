//! Handlers for the `/characters` resource.
//!
//! Creation uploads a photo, debits one credit and starts generation in the
//! background; clients then poll `/characters/{id}/status`. A character is
//! visible to everyone once it is public and completed, and always to its
//! owner. Invisible characters answer 404 so their existence is not leaked.

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use roastme_core::credits::GENERATION_COST;
use roastme_core::error::CoreError;
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::imaging::validate_upload;
use roastme_core::naming::{character_slug, upload_key};
use roastme_core::prompt::CharacterStyle;
use roastme_core::types::{DbId, Timestamp};
use roastme_core::user_errors::{describe_error, UserFacingError};
use roastme_db::models::character::{Character, CreateCharacter};
use roastme_db::models::image_upload::CreateImageUpload;
use roastme_db::repositories::{CharacterRepo, ImageUploadRepo};
use roastme_pipeline::og::ensure_og_image;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{MaybeViewer, Viewer};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A character as returned to clients.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    #[serde(flatten)]
    pub character: Character,
    pub status: GenerationStatus,
    pub is_owner: bool,
}

impl CharacterView {
    pub fn new(character: Character, viewer_id: Option<DbId>) -> Self {
        let is_owner = viewer_id.is_some_and(|id| character.is_owned_by(id));
        Self {
            status: character.status(),
            character,
            is_owner,
        }
    }
}

/// Polling payload for `/characters/{id}/status`.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub id: DbId,
    pub status: GenerationStatus,
    pub attempt: u32,
    pub is_terminal: bool,
    pub can_retry: bool,
    pub model_url: Option<String>,
    pub medium_url: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Present for failed characters.
    pub error: Option<UserFacingError>,
    pub updated_at: Timestamp,
}

impl StatusView {
    pub fn new(character: &Character, is_owner: bool) -> Self {
        let params = &character.generation_params.0;
        let failed = matches!(
            params.status,
            GenerationStatus::Failed | GenerationStatus::RetryFailed
        );
        let error = failed.then(|| describe_error(params.error.as_deref().unwrap_or(""), None));
        Self {
            id: character.id,
            status: params.status,
            attempt: params.attempt,
            is_terminal: params.status.is_terminal(),
            can_retry: is_owner && params.status == GenerationStatus::Failed,
            model_url: character.model_url.clone(),
            medium_url: character.medium_url.clone(),
            thumbnail_url: character.thumbnail_url.clone(),
            error,
            updated_at: character.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VisibilityInput {
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct CounterView {
    pub id: DbId,
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Character",
        id,
    })
}

fn out_of_credits() -> AppError {
    AppError::Core(CoreError::PaymentRequired(
        "No credits left. Buy a pack to roast again.".into(),
    ))
}

/// Load a character the viewer may see.
async fn find_visible(state: &AppState, id: DbId, viewer_id: Option<DbId>) -> AppResult<Character> {
    let character = CharacterRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let is_owner = viewer_id.is_some_and(|v| character.is_owned_by(v));
    if is_owner || character.is_publicly_visible() {
        Ok(character)
    } else {
        Err(not_found(id))
    }
}

/// Parsed `POST /characters` form.
struct UploadForm {
    image: Vec<u8>,
    style: CharacterStyle,
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut image: Option<Vec<u8>> = None;
    let mut style: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => image = Some(field.bytes().await?.to_vec()),
            "style" => style = Some(field.text().await?),
            _ => {} // ignore unknown fields
        }
    }

    let image =
        image.ok_or_else(|| AppError::BadRequest("Missing required 'image' field".into()))?;
    let style = match style.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<CharacterStyle>()?,
        None => CharacterStyle::default(),
    };
    Ok(UploadForm { image, style })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/characters
///
/// Multipart form: required `image` (JPEG/PNG/WebP), optional `style`.
/// Responds 202 with the `pending` character; generation continues in the
/// background. 402 when the viewer has no credits left.
pub async fn create(
    State(state): State<AppState>,
    viewer: Viewer,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<CharacterView>>)> {
    let user = viewer.user;
    if user.credits < GENERATION_COST {
        return Err(out_of_credits());
    }

    let form = read_upload_form(multipart).await?;
    let meta = validate_upload(&form.image, state.config.max_upload_bytes)?;

    let key = upload_key(user.id, &Uuid::new_v4(), meta.mime);
    let size_bytes = form.image.len() as i64;
    let url = state.objects.put(&key, form.image, meta.mime).await?;
    let upload = ImageUploadRepo::create(
        &state.pool,
        &CreateImageUpload {
            user_id: user.id,
            storage_key: key,
            url,
            size_bytes,
            mime_type: meta.mime.to_string(),
            width: meta.width as i32,
            height: meta.height as i32,
        },
    )
    .await?;

    let input = CreateCharacter {
        user_id: user.id,
        image_upload_id: Some(upload.id),
        slug: character_slug(form.style.as_str(), None),
        style: form.style.as_str().to_string(),
        generation_params: GenerationParams::new(form.style, chrono::Utc::now()),
    };
    let character = CharacterRepo::create_with_debit(&state.pool, &input, GENERATION_COST)
        .await?
        .ok_or_else(out_of_credits)?;

    tracing::info!(
        character_id = character.id,
        user_id = user.id,
        style = %form.style,
        upload_id = upload.id,
        "Character created, starting generation"
    );
    state.generator.spawn_initial(character.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CharacterView::new(character, Some(user.id)),
        }),
    ))
}

/// GET /api/v1/characters/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: MaybeViewer,
) -> AppResult<Json<DataResponse<CharacterView>>> {
    let character = find_visible(&state, id, viewer.user_id()).await?;
    Ok(Json(DataResponse {
        data: CharacterView::new(character, viewer.user_id()),
    }))
}

/// GET /api/v1/characters/{id}/status
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: MaybeViewer,
) -> AppResult<Json<DataResponse<StatusView>>> {
    let character = find_visible(&state, id, viewer.user_id()).await?;
    let is_owner = viewer.user_id().is_some_and(|v| character.is_owned_by(v));
    Ok(Json(DataResponse {
        data: StatusView::new(&character, is_owner),
    }))
}

/// POST /api/v1/characters/{id}/retry
///
/// Owner only. Moves a `failed` character to `retrying` and starts a new
/// run; 409 from any other status. Retries are free.
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: Viewer,
) -> AppResult<(StatusCode, Json<DataResponse<StatusView>>)> {
    let character = find_visible(&state, id, Some(viewer.user.id)).await?;
    if !character.is_owned_by(viewer.user.id) {
        return Err(CoreError::Forbidden("Only the owner can retry a character".into()).into());
    }

    state.generator.request_retry(id).await?;
    tracing::info!(character_id = id, user_id = viewer.user.id, "Retry requested");
    state.generator.spawn_run(id);

    let character = CharacterRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: StatusView::new(&character, true),
        }),
    ))
}

/// PATCH /api/v1/characters/{id}/visibility
pub async fn set_visibility(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: Viewer,
    Json(input): Json<VisibilityInput>,
) -> AppResult<Json<DataResponse<CharacterView>>> {
    let character = CharacterRepo::set_visibility(&state.pool, id, viewer.user.id, input.is_public)
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(character_id = id, is_public = input.is_public, "Visibility changed");
    Ok(Json(DataResponse {
        data: CharacterView::new(character, Some(viewer.user.id)),
    }))
}

/// POST /api/v1/characters/{id}/like
///
/// Idempotent per viewer; returns the like count.
pub async fn like(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: Viewer,
) -> AppResult<Json<DataResponse<CounterView>>> {
    find_visible(&state, id, Some(viewer.user.id)).await?;
    let count = CharacterRepo::like(&state.pool, id, viewer.user.id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse {
        data: CounterView { id, count },
    }))
}

/// POST /api/v1/characters/{id}/view
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: MaybeViewer,
) -> AppResult<Json<DataResponse<CounterView>>> {
    find_visible(&state, id, viewer.user_id()).await?;
    let count = CharacterRepo::increment_views(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse {
        data: CounterView { id, count },
    }))
}

/// GET /api/v1/characters/{id}/og-image
///
/// The 1200x630 PNG preview, composed on first request if the runner did not
/// already produce it. 409 until the character is completed.
pub async fn og_image(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    viewer: MaybeViewer,
) -> AppResult<impl IntoResponse> {
    find_visible(&state, id, viewer.user_id()).await?;
    let store = state.generator.store();
    let job = store.load(id).await?.ok_or_else(|| not_found(id))?;
    let png = ensure_og_image(store.as_ref(), state.objects.as_ref(), &job).await?;

    Ok((
        [
            (CONTENT_TYPE, "image/png"),
            (CACHE_CONTROL, "public, max-age=86400"),
        ],
        png,
    ))
}
