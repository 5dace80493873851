pub mod analyze;
pub mod error;
pub mod sessions;
pub mod status;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::config::CONFIG;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(status::healthz))
        .route("/api/status", get(status::service_status))
        .route("/api/diagnostics", get(status::diagnostics))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/{id}", get(sessions::get_session))
        .route(
            "/api/sessions/{id}/image",
            put(sessions::upload_image).delete(sessions::clear_image),
        )
        .route("/api/sessions/{id}/analyze", post(analyze::analyze_session))
        .route("/api/sessions/{id}/reset", post(sessions::reset_session))
        // Multipart overhead on top of the raw image cap.
        .layer(DefaultBodyLimit::max(CONFIG.max_image_bytes + 64 * 1024))
        .with_state(state)
}
