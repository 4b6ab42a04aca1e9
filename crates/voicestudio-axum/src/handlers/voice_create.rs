//! Voice design handlers.

use axum::extract::State;
use axum::{Form, Json};
use voicestudio_core::{ParlerStatus, PreviewRequest, PreviewResult};

use crate::bridge::run_generation;
use crate::error::HttpError;
use crate::state::AppState;

/// `POST /api/voices/create/preview-from-prompt`
///
/// Runs until the preview is ready or the client disconnects.
pub async fn preview_from_prompt(
    State(state): State<AppState>,
    Form(request): Form<PreviewRequest>,
) -> Result<Json<PreviewResult>, HttpError> {
    run_generation(&state, request).await.map(Json)
}

/// `GET /api/voices/create/parler-status`
pub async fn parler_status(State(state): State<AppState>) -> Json<ParlerStatus> {
    let available = state.designer.is_available().await;
    let models = if available {
        state.designer.models()
    } else {
        Vec::new()
    };
    Json(ParlerStatus { available, models })
}
