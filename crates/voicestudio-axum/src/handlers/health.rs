//! Health handler.

use axum::Json;
use axum::extract::State;
use voicestudio_core::HealthStatus;

use crate::error::HttpError;
use crate::handlers::probe_gpu;
use crate::state::AppState;

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>, HttpError> {
    let gpu = probe_gpu(&state).await?;
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        gpu_available: gpu.available,
        gpu_name: gpu.name,
    }))
}
