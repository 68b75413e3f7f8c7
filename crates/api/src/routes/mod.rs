pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::{characters, credits, gallery, me, waitlist, webhooks};
use crate::state::AppState;

/// Multipart framing allowance on top of the photo itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /me                                  viewer identity, credits, plan
/// /me/characters                       viewer's characters
/// /me/claim                            merge anonymous session (POST, bearer)
///
/// /characters                          upload and start generation (POST)
/// /characters/{id}                     detail (public or owner)
/// /characters/{id}/status              generation polling
/// /characters/{id}/retry               retry a failed generation (POST)
/// /characters/{id}/visibility          toggle is_public (PATCH, owner)
/// /characters/{id}/like                idempotent like (POST)
/// /characters/{id}/view                view counter (POST)
/// /characters/{id}/og-image            1200x630 PNG preview
///
/// /share/{slug}                        share-page data
/// /gallery                             public gallery
///
/// /credits/packages                    purchasable packages
/// /credits/checkout                    hosted checkout (POST)
///
/// /webhooks/stripe                     Stripe webhook (POST)
/// /webhooks/lemonsqueezy               Lemon Squeezy webhook (POST)
///
/// /waitlist                            waitlist signup (POST)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    let upload_limit = config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        // Viewer
        .route("/me", get(me::get_me))
        .route("/me/characters", get(me::list_characters))
        .route("/me/claim", post(me::claim))
        // Characters
        .route(
            "/characters",
            post(characters::create).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/characters/{id}", get(characters::get_by_id))
        .route("/characters/{id}/status", get(characters::status))
        .route("/characters/{id}/retry", post(characters::retry))
        .route(
            "/characters/{id}/visibility",
            patch(characters::set_visibility),
        )
        .route("/characters/{id}/like", post(characters::like))
        .route("/characters/{id}/view", post(characters::view))
        .route("/characters/{id}/og-image", get(characters::og_image))
        // Public
        .route("/share/{slug}", get(gallery::share))
        .route("/gallery", get(gallery::list))
        // Credits
        .route("/credits/packages", get(credits::packages))
        .route("/credits/checkout", post(credits::checkout))
        // Webhooks
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route(
            "/webhooks/lemonsqueezy",
            post(webhooks::lemonsqueezy_webhook),
        )
        // Waitlist
        .route("/waitlist", post(waitlist::join))
}
