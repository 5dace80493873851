use std::error::Error;

use axum::http::HeaderValue;
use dotenvy::dotenv;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod config;
mod handlers;
mod llm;
mod profile;
mod session;
mod state;
mod utils;

use config::CONFIG;
use state::AppState;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let _guards = init_logging();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::new();
    let app = handlers::api_router(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&CONFIG.bind_address).await?;
    info!(
        "Listening on {} (model: {})",
        CONFIG.bind_address, CONFIG.gemini_model
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

fn build_cors_layer() -> CorsLayer {
    let permissive = || {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let origin = CONFIG.cors_allowed_origin.trim();
    if origin.is_empty() {
        return permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!("Invalid CORS_ALLOWED_ORIGIN '{origin}'; allowing any origin");
            permissive()
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
