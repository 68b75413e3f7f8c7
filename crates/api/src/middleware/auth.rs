//! Viewer extractors for Axum handlers.
//!
//! A viewer is identified by a hosted-auth bearer token when one is sent,
//! otherwise by the anonymous session cookie. Users are provisioned on
//! first sight with the configured signup credits.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use roastme_core::error::CoreError;
use roastme_core::types::DbId;
use roastme_db::models::user::User;
use roastme_db::repositories::UserRepo;
use uuid::Uuid;

use crate::auth::jwt::{validate_token, Claims};
use crate::auth::session::{session_from_headers, SessionId};
use crate::error::AppError;
use crate::state::AppState;

/// The current user, authenticated or anonymous, created if needed.
///
/// ```ignore
/// async fn my_handler(viewer: Viewer) -> AppResult<Json<()>> {
///     tracing::info!(user_id = viewer.user.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: User,
}

/// An authenticated user; rejects requests without a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
    /// The request's anonymous session, for claiming.
    pub session: Option<Uuid>,
}

/// The current user if one already exists. Never creates rows.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<User>);

impl MaybeViewer {
    pub fn user_id(&self) -> Option<DbId> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let initial_credits = state.config.initial_credits;
        let user = match bearer_claims(parts, state)? {
            Some(claims) => {
                UserRepo::find_or_create_authenticated(
                    &state.pool,
                    &claims.sub,
                    claims.email.as_deref(),
                    initial_credits,
                )
                .await?
            }
            None => {
                let session = session_id(parts).ok_or_else(|| {
                    AppError::InternalError("request has no session id".into())
                })?;
                UserRepo::find_or_create_anonymous(&state.pool, session, initial_credits).await?
            }
        };
        Ok(Viewer { user })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;
        let user = UserRepo::find_or_create_authenticated(
            &state.pool,
            &claims.sub,
            claims.email.as_deref(),
            state.config.initial_credits,
        )
        .await?;
        Ok(AuthUser {
            user,
            claims,
            session: session_id(parts),
        })
    }
}

impl FromRequestParts<AppState> for MaybeViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match bearer_claims(parts, state)? {
            Some(claims) => UserRepo::find_by_subject(&state.pool, &claims.sub).await?,
            None => match session_id(parts) {
                Some(session) => UserRepo::find_by_session(&state.pool, session).await?,
                None => None,
            },
        };
        Ok(MaybeViewer(user))
    }
}

/// Decode the bearer token, if the request sends one.
///
/// A malformed or invalid token is an error rather than falling back to the
/// anonymous session.
fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Option<Claims>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

    let claims = validate_token(token.trim(), &state.config.auth).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
    })?;
    Ok(Some(claims))
}

fn session_id(parts: &Parts) -> Option<Uuid> {
    parts
        .extensions
        .get::<SessionId>()
        .map(|s| s.0)
        .or_else(|| session_from_headers(&parts.headers))
}
