use std::path::PathBuf;
use std::sync::Arc;

use roastme_payments::{CheckoutProvider, PaymentConfig};
use roastme_pipeline::Generator;
use roastme_storage::ObjectStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: roastme_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Uploaded photos and generated renditions.
    pub objects: Arc<dyn ObjectStore>,
    /// Background generation runner.
    pub generator: Arc<Generator>,
    /// Webhook secrets and provider selection.
    pub payments: Arc<PaymentConfig>,
    /// Checkout client for the configured provider; `None` when its
    /// credentials are missing.
    pub checkout: Option<Arc<dyn CheckoutProvider>>,
    /// Directory served at `/files` when the local storage backend is used.
    pub files_dir: Option<PathBuf>,
}
