use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::handlers::error::ApiError;
use crate::llm::media::{detect_mime_type, resolve_image_mime, ImagePayload};
use crate::llm::report::AnalysisResult;
use crate::session::{Session, SessionPhase};
use crate::state::AppState;

/// What the presentation layer renders: the status tag plus the data
/// valid for it. `result` and `error` are mutually exclusive.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub status: &'static str,
    pub has_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionView {
    pub fn from_session(id: Uuid, session: &Session) -> Self {
        let (result, error) = match session.phase() {
            SessionPhase::Result(result) => (Some(result.clone()), None),
            SessionPhase::Error(message) => (None, Some(message.clone())),
            _ => (None, None),
        };
        SessionView {
            session_id: id,
            status: session.phase().as_str(),
            has_image: session.has_image(),
            result,
            error,
        }
    }
}

pub fn with_session<T>(
    state: &AppState,
    id: Uuid,
    apply: impl FnOnce(&mut Session) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let mut sessions = state.sessions.lock();
    let session = sessions
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {id}")))?;
    apply(session)
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = state.create_session();
    info!("Created analysis session {id}");
    let view = SessionView {
        session_id: id,
        status: "idle",
        has_image: false,
        result: None,
        error: None,
    };
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, id, |session| {
        Ok(SessionView::from_session(id, session))
    })?;
    Ok(Json(view))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, id, |session| {
        session.reset();
        Ok(SessionView::from_session(id, session))
    })?;
    info!("Session {id} reset to idle");
    Ok(Json(view))
}

/// Multipart upload of the meal photo (`image` field). Validated here so
/// the orchestrator never sees a payload it cannot send.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let mut payload: Option<ImagePayload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Failed to read multipart field: {err}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "image" {
            continue;
        }

        let declared_mime = field.content_type().map(|value| value.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(format!("Failed to read image: {err}")))?;

        if data.len() > CONFIG.max_image_bytes {
            return Err(ApiError::BadRequest(format!(
                "Image too large. Max size is {} bytes",
                CONFIG.max_image_bytes
            )));
        }

        let mime_type = declared_mime
            .or_else(|| detect_mime_type(&data))
            .unwrap_or_default();
        payload = Some(ImagePayload::new(data.to_vec(), mime_type));
    }

    let payload = payload.ok_or_else(|| ApiError::BadRequest("Missing image field".to_string()))?;
    if payload.is_empty() {
        return Err(ApiError::BadRequest("Image payload is empty".to_string()));
    }
    if resolve_image_mime(&payload).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unsupported image type '{}'",
            payload.mime_type
        )));
    }

    let size = payload.bytes.len();
    let view = with_session(&state, id, |session| {
        session.select_image(payload)?;
        Ok(SessionView::from_session(id, session))
    })?;
    info!("Session {id} selected a {size}-byte image");
    Ok(Json(view))
}

pub async fn clear_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, id, |session| {
        session.clear_image()?;
        Ok(SessionView::from_session(id, session))
    })?;
    Ok(Json(view))
}
