//! Handlers for the viewer's own account: `/me`.

use axum::extract::{Query, State};
use axum::Json;
use roastme_core::credits::PlanTier;
use roastme_core::types::DbId;
use roastme_db::repositories::{CharacterRepo, UserRepo};
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::characters::CharacterView;
use crate::middleware::auth::{AuthUser, Viewer};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MeView {
    pub id: DbId,
    pub anonymous: bool,
    pub email: Option<String>,
    pub credits: i32,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize)]
pub struct ClaimView {
    /// Whether an anonymous account was found and merged.
    pub claimed: bool,
    pub characters_moved: u64,
    pub credits_moved: i32,
    pub credits: i32,
}

/// GET /api/v1/me
pub async fn get_me(viewer: Viewer) -> AppResult<Json<DataResponse<MeView>>> {
    let user = viewer.user;
    Ok(Json(DataResponse {
        data: MeView {
            id: user.id,
            anonymous: user.is_anonymous(),
            plan: user.plan_tier(),
            email: user.email,
            credits: user.credits,
        },
    }))
}

/// GET /api/v1/me/characters
pub async fn list_characters(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<CharacterView>>>> {
    let (limit, offset) = params.clamped();
    let user_id = viewer.user.id;
    let characters = CharacterRepo::list_by_user(&state.pool, user_id, limit, offset).await?;
    Ok(Json(DataResponse {
        data: characters
            .into_iter()
            .map(|c| CharacterView::new(c, Some(user_id)))
            .collect(),
    }))
}

/// POST /api/v1/me/claim
///
/// Merges the anonymous account behind the session cookie into the
/// authenticated user. Claiming twice (or with no anonymous account) is a
/// no-op that reports `claimed: false`.
pub async fn claim(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<ClaimView>>> {
    let outcome = match auth.session {
        Some(session) => UserRepo::claim_anonymous(&state.pool, session, auth.user.id).await?,
        None => None,
    };

    let view = match outcome {
        Some(outcome) => {
            tracing::info!(
                user_id = auth.user.id,
                characters = outcome.characters_moved,
                credits = outcome.credits_moved,
                "Anonymous session claimed"
            );
            ClaimView {
                claimed: true,
                characters_moved: outcome.characters_moved,
                credits_moved: outcome.credits_moved,
                credits: outcome.balance,
            }
        }
        None => ClaimView {
            claimed: false,
            characters_moved: 0,
            credits_moved: 0,
            credits: auth.user.credits,
        },
    };
    Ok(Json(DataResponse { data: view }))
}
