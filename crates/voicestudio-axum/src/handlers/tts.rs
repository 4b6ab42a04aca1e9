//! TTS engine handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use tracing::info;
use voicestudio_core::{EngineInstallResult, ProgressEmitter};

use crate::error::HttpError;
use crate::state::AppState;

/// `POST /api/tts/engines/install/{name}`
///
/// Progress streams as `install_progress` with `engine` set to `name`.
pub async fn install_engine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EngineInstallResult>, HttpError> {
    info!(engine = %name, "Engine install requested");
    let emitter: Arc<dyn ProgressEmitter> = state.broadcaster.clone();
    let result = state.installer.install_engine(&name, emitter).await?;
    Ok(Json(result))
}
