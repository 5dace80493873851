use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::error::ApiError;
use crate::handlers::sessions::{with_session, SessionView};
use crate::llm;
use crate::profile::UserProfile;
use crate::state::AppState;
use crate::utils::timing::RequestTimer;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub session: SessionView,
    /// Hunger as a fraction of capacity, for the load gauge.
    pub system_load: f64,
}

/// Runs one analysis for the session: locks in the Analyzing phase, makes
/// the single model round trip, and lands the outcome unless a reset beat
/// it to the session.
pub async fn analyze_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut profile): Json<UserProfile>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    profile.normalize();
    profile
        .validate()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let (generation, image) = with_session(&state, id, |session| {
        session.begin_analysis().map_err(ApiError::from)
    })?;

    let session_id = id.to_string();
    let mut timer = RequestTimer::start("analyze", Some(&session_id));

    let outcome = llm::analyze_meal_photo(&image, &profile).await;

    let landed = match outcome {
        Ok(result) => {
            timer.mark_status("success", None);
            with_session(&state, id, |session| {
                Ok(session.complete_analysis(generation, Ok(result)))
            })
        }
        Err(err) => {
            warn!("Analysis failed for session {id}: {}", err.detail());
            timer.mark_status("error", Some(err.detail()));
            with_session(&state, id, |session| {
                Ok(session.complete_analysis(generation, Err(err.to_string())))
            })
        }
    };
    timer.log_completed();

    match landed {
        Ok(true) => {}
        Ok(false) => {
            info!("Session {id} was reset mid-analysis; dropping the late outcome");
        }
        Err(err) => {
            // The session was evicted while the call was outstanding.
            info!("Session {id} disappeared mid-analysis; dropping the outcome");
            return Err(err);
        }
    }

    let view = with_session(&state, id, |session| {
        Ok(SessionView::from_session(id, session))
    })?;
    Ok(Json(AnalyzeResponse {
        session: view,
        system_load: profile.normalized_hunger_load(),
    }))
}
