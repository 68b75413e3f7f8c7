//! Credit packages and hosted checkout.

use axum::extract::State;
use axum::Json;
use roastme_core::credits::{CreditPackage, PackageInfo};
use roastme_payments::{CheckoutRequest, CheckoutSession, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Viewer;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PackagesView {
    pub packages: Vec<PackageInfo>,
    /// Provider new checkouts go through; `null` when payments are disabled.
    pub provider: Option<ProviderKind>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub package: CreditPackage,
}

/// GET /api/v1/credits/packages
pub async fn packages(State(state): State<AppState>) -> Json<DataResponse<PackagesView>> {
    Json(DataResponse {
        data: PackagesView {
            packages: CreditPackage::ALL.iter().map(|p| p.info()).collect(),
            provider: state.checkout.as_ref().map(|c| c.kind()),
        },
    })
}

/// POST /api/v1/credits/checkout
///
/// Creates a hosted checkout for `package`; the client redirects to the
/// returned `url`. Credits arrive later through the provider's webhook.
pub async fn checkout(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(input): Json<CheckoutInput>,
) -> AppResult<Json<DataResponse<CheckoutSession>>> {
    let provider = state
        .checkout
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Payments are not configured".into()))?;

    let frontend = &state.config.frontend_url;
    let request = CheckoutRequest {
        user_id: viewer.user.id,
        package: input.package,
        email: viewer.user.email.clone(),
        success_url: format!("{frontend}/credits?status=success"),
        cancel_url: format!("{frontend}/credits?status=cancelled"),
    };
    let session = provider.create_checkout(&request).await?;

    tracing::info!(
        user_id = viewer.user.id,
        package = %input.package,
        provider = %session.provider,
        session_id = %session.id,
        "Checkout created"
    );
    Ok(Json(DataResponse { data: session }))
}
