//! Mediasearch Server - REST API for perceptual media search
//!
//! Exposes mediasearch-core over HTTP:
//! - GET /media/{provider}/{archive}/_select|_search - Listings and similarity search
//! - POST /media/{provider}/{archive}/_insert|_update|_delete|_drop|_repair - Mutations

use std::net::SocketAddr;

use mediasearch_server::{create_router_with_config, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,mediasearch_server=debug,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env();
    let state = AppState::from_config(&config).await?;
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    tracing::info!("Mediasearch server listening on {}", addr);
    tracing::info!("API docs at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    // Peer addresses feed the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
