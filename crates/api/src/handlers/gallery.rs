//! Public surfaces: the gallery listing and share-page data.

use axum::extract::{Path, Query, State};
use axum::Json;
use roastme_db::models::character::Character;
use roastme_db::repositories::CharacterRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::characters::CharacterView;
use crate::query::PaginationParams;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

/// Everything a share page needs for its OG/Twitter meta tags.
#[derive(Debug, Serialize)]
pub struct SharePage {
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Canonical frontend URL of the share page.
    pub url: String,
    pub character: CharacterView,
}

impl SharePage {
    fn new(character: Character, public_base_url: &str, frontend_url: &str) -> Self {
        let title = character
            .og_title
            .clone()
            .unwrap_or_else(|| "Roasted as a collectible figurine".to_string());
        let description = character
            .og_description
            .clone()
            .unwrap_or_else(|| "Upload a photo and get roasted as a collectible figurine.".into());
        let image_url = character.og_image_url.clone().unwrap_or_else(|| {
            format!("{public_base_url}/api/v1/characters/{}/og-image", character.id)
        });
        let url = format!("{frontend_url}/c/{}", character.slug);
        Self {
            title,
            description,
            image_url,
            url,
            character: CharacterView::new(character, None),
        }
    }
}

/// GET /api/v1/gallery
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Page<CharacterView>>>> {
    let (limit, offset) = params.clamped();
    let characters = CharacterRepo::list_public(&state.pool, limit, offset).await?;
    let total = CharacterRepo::count_public(&state.pool).await?;

    Ok(Json(DataResponse {
        data: Page {
            items: characters
                .into_iter()
                .map(|c| CharacterView::new(c, None))
                .collect(),
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/v1/share/{slug}
pub async fn share(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<SharePage>>> {
    let character = CharacterRepo::find_by_slug(&state.pool, &slug)
        .await?
        .filter(Character::is_publicly_visible)
        .ok_or_else(|| AppError::NotFound(format!("No shared character '{slug}'")))?;

    Ok(Json(DataResponse {
        data: SharePage::new(
            character,
            &state.config.public_base_url,
            &state.config.frontend_url,
        ),
    }))
}

#[cfg(test)]
mod tests {
    use roastme_core::generation::{GenerationParams, GenerationStatus};
    use roastme_core::prompt::CharacterStyle;
    use sqlx::types::Json;

    use super::*;

    fn character(og_image_url: Option<&str>) -> Character {
        let now = chrono::Utc::now();
        let mut params = GenerationParams::new(CharacterStyle::default(), now);
        params.status = GenerationStatus::Completed;
        Character {
            id: 42,
            user_id: 7,
            image_upload_id: None,
            slug: "office-goblin-x1y2".into(),
            style: CharacterStyle::default().as_str().into(),
            model_url: None,
            thumbnail_url: None,
            medium_url: None,
            og_title: Some("Roasted as an Action Figure".into()),
            og_description: None,
            og_image_url: og_image_url.map(String::from),
            features: Json(Vec::new()),
            generation_params: Json(params),
            is_public: true,
            view_count: 0,
            like_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn share_page_falls_back_to_og_endpoint() {
        let page = SharePage::new(character(None), "https://api.roast.me", "https://roast.me");
        assert_eq!(page.image_url, "https://api.roast.me/api/v1/characters/42/og-image");
        assert_eq!(page.url, "https://roast.me/c/office-goblin-x1y2");
        assert_eq!(page.title, "Roasted as an Action Figure");
        assert!(page.description.contains("figurine"));
        assert!(!page.character.is_owner);
    }

    #[test]
    fn share_page_prefers_stored_og_image() {
        let page = SharePage::new(
            character(Some("https://cdn.roast.me/og/42.png")),
            "https://api.roast.me",
            "https://roast.me",
        );
        assert_eq!(page.image_url, "https://cdn.roast.me/og/42.png");
    }
}
