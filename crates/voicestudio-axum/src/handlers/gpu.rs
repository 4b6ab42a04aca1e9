//! GPU handlers - telemetry and the CUDA repair.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tracing::info;
use voicestudio_core::{EngineInstallResult, GpuStatus, ProgressEmitter};

use crate::error::HttpError;
use crate::handlers::probe_gpu;
use crate::state::AppState;

/// `GET /api/gpu/status`
pub async fn status(State(state): State<AppState>) -> Result<Json<GpuStatus>, HttpError> {
    probe_gpu(&state).await.map(Json)
}

/// `POST /api/gpu/fix-cuda`
///
/// Progress streams as `install_progress` with `engine: "cuda"`.
pub async fn fix_cuda(
    State(state): State<AppState>,
) -> Result<Json<EngineInstallResult>, HttpError> {
    info!("CUDA repair requested");
    let emitter: Arc<dyn ProgressEmitter> = state.broadcaster.clone();
    let result = state.installer.fix_cuda(emitter).await?;
    Ok(Json(result))
}
