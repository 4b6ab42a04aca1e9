//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for one API area. Handlers are thin
//! wrappers over the ports held in [`AxumContext`](crate::AxumContext).

pub mod gpu;
pub mod health;
pub mod tts;
pub mod voice_create;
pub mod ws;

use voicestudio_core::GpuStatus;

use crate::error::HttpError;
use crate::state::AppState;

/// Run the GPU probe off the async workers; `nvidia-smi` can take a while.
pub(crate) async fn probe_gpu(state: &AppState) -> Result<GpuStatus, HttpError> {
    let gpu = state.gpu.clone();
    tokio::task::spawn_blocking(move || gpu.gpu_status())
        .await
        .map_err(|e| HttpError::Internal(format!("GPU probe failed: {e}")))
}
