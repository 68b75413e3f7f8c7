//! Waitlist signup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use roastme_core::waitlist::{normalize_email, normalize_source};
use roastme_db::repositories::WaitlistRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WaitlistInput {
    pub email: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WaitlistView {
    pub email: String,
    pub already_joined: bool,
}

/// POST /api/v1/waitlist
///
/// 201 on a new signup, 200 when the email was already on the list.
pub async fn join(
    State(state): State<AppState>,
    Json(input): Json<WaitlistInput>,
) -> AppResult<(StatusCode, Json<DataResponse<WaitlistView>>)> {
    let email = normalize_email(&input.email)?;
    let source = normalize_source(input.source.as_deref());

    let inserted = WaitlistRepo::signup(&state.pool, &email, source.as_deref()).await?;
    if inserted {
        tracing::info!(source = source.as_deref().unwrap_or("-"), "Waitlist signup");
    }

    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: WaitlistView {
                email,
                already_joined: !inserted,
            },
        }),
    ))
}
