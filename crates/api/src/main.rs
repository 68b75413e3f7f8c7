use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roastme_ai::{AiConfig, OpenAiClient};
use roastme_payments::PaymentConfig;
use roastme_pipeline::{GenerationConfig, Generator, PgGenerationStore};
use roastme_storage::StorageConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roastme_api::config::ServerConfig;
use roastme_api::router::build_app_router;
use roastme_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "roastme_api=debug,roastme_pipeline=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    let ai_config = AiConfig::from_env();
    let storage_config = StorageConfig::from_env(&config.public_base_url);
    let payments = PaymentConfig::from_env();
    let generation = GenerationConfig::from_env();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = roastme_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    roastme_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    roastme_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Storage ---
    let objects = roastme_storage::connect(&storage_config)
        .await
        .expect("Failed to initialise object storage");
    tracing::info!(backend = ?storage_config.backend, "Object storage ready");

    // --- Generation ---
    let ai = Arc::new(OpenAiClient::new(ai_config).expect("Failed to build AI client"));
    let store = Arc::new(PgGenerationStore::new(pool.clone()));
    let generator = Arc::new(Generator::new(
        store.clone(),
        ai,
        Arc::clone(&objects),
        &generation,
    ));

    // Spawn the stale-generation sweeper.
    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(roastme_pipeline::sweeper::run(
        store,
        generation.clone(),
        sweeper_cancel.clone(),
    ));

    // --- Payments ---
    let checkout = match roastme_payments::checkout_provider(&payments) {
        Ok(provider) => {
            tracing::info!(provider = %provider.kind(), "Checkout provider ready");
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Checkout disabled");
            None
        }
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        objects,
        generator,
        payments: Arc::new(payments),
        checkout,
        files_dir: storage_config.local_root().cloned(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        sweeper_handle,
    )
    .await;
    tracing::info!("Generation sweeper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
