use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::config::CONFIG;
use crate::handlers::error::ApiError;
use crate::state::AppState;
use crate::utils::logging::read_recent_log_lines;

const DIAGNOSTICS_LOG_LINES: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub model: String,
    pub uptime_seconds: i64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub log_file: Option<String>,
    pub lines: Vec<String>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        model: CONFIG.gemini_model.clone(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        active_sessions: state.session_count(),
    })
}

pub async fn diagnostics() -> Result<Json<Diagnostics>, ApiError> {
    let tail = read_recent_log_lines("service", DIAGNOSTICS_LOG_LINES)
        .map_err(|err| ApiError::Internal(format!("Failed to read logs: {err}")))?;

    let diagnostics = match tail {
        Some(tail) => Diagnostics {
            log_file: Some(tail.path.display().to_string()),
            lines: tail.lines,
        },
        None => Diagnostics {
            log_file: None,
            lines: Vec::new(),
        },
    };
    Ok(Json(diagnostics))
}
