//! Venezuela R011 Direct Cleaning API Server
//!
//! REST API that cleans Excel workbooks and uploads them to Google Cloud
//!
//! Usage:
//!   cargo run --bin cleaning_api
//!
//! Environment:
//!   PORT / CLEANING_PORT           - Server port (default: 8750)
//!   CLEANING_HOST                  - Server host (default: 0.0.0.0)
//!   CLEANING_WORKERS               - Runtime worker threads (default: 2)
//!   CLEANING_TIMEOUT_SECS          - Per-request timeout (default: 120)
//!   GOOGLE_APPLICATION_CREDENTIALS - Credentials file (default: /app/credentials.json)
//!   RUST_LOG                       - Log filter (default: info)

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vzla_cleaning::providers::build_http_client;
use vzla_cleaning::utils::constants::APP_VERSION;
use vzla_cleaning::{create_router, AppState, CredentialResolver, ServerConfig};

fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = ServerConfig::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> eyre::Result<()> {
    print_banner();

    let http = build_http_client()?;
    let resolver = CredentialResolver::from_config(&config, http.clone());
    let addr = config.bind_address();

    info!(
        workers = config.workers,
        timeout_secs = config.request_timeout.as_secs(),
        credentials = %config.credentials_path.display(),
        "⚙️  Configuration loaded"
    );

    let state = Arc::new(AppState::new(config, http, resolver));
    let app = create_router(state);

    info!("🚀 Cleaning API starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  GET  /health          - Health check");
    info!("  GET  /test/bigquery   - BigQuery connection test");
    info!("  GET  /test/storage    - Cloud Storage connection test");
    info!("  POST /process         - Clean an Excel file (multipart field \"file\")");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");
    info!("");

    let listener = TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("");
    info!("🛑 Shutdown signal received");
    info!("👋 Cleaning API shutdown complete");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_banner() {
    println!(
        r#"
    +--------------------------------------------------------------+
    |                                                              |
    |          V Z L A   R 0 1 1   D I R E C T   C L E A N          |
    |                                                              |
    |              C L E A N I N G   A P I   v{:<8}             |
    |        Excel cleaning -> BigQuery / Storage / Sheets         |
    |                                                              |
    +--------------------------------------------------------------+
    "#,
        APP_VERSION
    );
}
