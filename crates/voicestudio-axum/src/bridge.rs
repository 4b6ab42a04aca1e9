//! Generation lifecycle, server side.
//!
//! A preview generation has no deadline. What bounds it is the request that
//! asked for it. [`run_generation`] hands the work to its own task and holds
//! the task's [`CancellationToken`] through a drop guard. When the client's
//! connection goes away axum drops the handler future, the guard fires, and
//! the still-running task tells the design backend to stop. The token is a
//! child of the server's shutdown token, so shutting down cancels every
//! generation in flight.
//!
//! Progress goes out on the event channel only. The outcome goes back on the
//! HTTP response.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;
use voicestudio_core::{
    ChannelMessage, DesignError, PreviewRequest, PreviewResult, ProgressEmitter,
    default_voice_model, find_voice_model,
};

use crate::error::HttpError;
use crate::state::AppState;

/// Run one preview generation for the lifetime of the calling request.
pub async fn run_generation(
    state: &AppState,
    request: PreviewRequest,
) -> Result<PreviewResult, HttpError> {
    if !state.designer.is_available().await {
        return Err(DesignError::Unavailable.into());
    }

    let cancel = state.broadcaster.shutdown_token().child_token();
    let _guard = cancel.clone().drop_guard();

    tokio::spawn(generate(Arc::clone(state), request, cancel))
        .await
        .map_err(|e| HttpError::Internal(format!("Preview generation failed: {e}")))?
}

async fn generate(
    state: AppState,
    request: PreviewRequest,
    cancel: CancellationToken,
) -> Result<PreviewResult, HttpError> {
    let model_name = find_voice_model(&request.model_id)
        .unwrap_or_else(default_voice_model)
        .name;

    let date = chrono::Local::now().format("%Y%m%d").to_string();
    let file_name = preview_file_name();
    let output = state.config.previews_dir.join(&date).join(&file_name);

    let emitter: Arc<dyn ProgressEmitter> = state.broadcaster.clone();
    let beat = cancel.child_token();
    let heartbeat = tokio::spawn(heartbeat(
        Arc::clone(&emitter),
        model_name,
        state.config.heartbeat_interval,
        beat.clone(),
    ));

    info!(model = %request.model_id, output = %output.display(), "Generation started");
    let started = Instant::now();

    let outcome = state
        .designer
        .generate_preview(&request, &output, Arc::clone(&emitter), cancel.clone())
        .await;

    // No heartbeat may follow the final message.
    beat.cancel();
    let _ = heartbeat.await;

    match outcome {
        Ok(preview) => {
            info!(
                model = %request.model_id,
                duration = preview.duration_secs,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Generation finished"
            );
            emitter.emit(ChannelMessage::progress(
                "complete",
                format!("Preview generated ({:.1}s)", preview.duration_secs),
                100,
            ));
            Ok(PreviewResult {
                audio_url: format!("/api/previews/{date}/{file_name}"),
                duration: preview.duration_secs,
                model_id: request.model_id,
            })
        }
        Err(DesignError::Cancelled) => {
            info!(
                model = %request.model_id,
                elapsed_secs = started.elapsed().as_secs(),
                "Generation cancelled"
            );
            Err(HttpError::Cancelled)
        }
        Err(e) => {
            error!(model = %request.model_id, error = %e, "Generation failed");
            Err(e.into())
        }
    }
}

/// `preview_<12 hex chars>.wav`
fn preview_file_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("preview_{}.wav", &id[..12])
}

/// Announce that inference is still running, every `every`, until cancelled.
async fn heartbeat(
    emitter: Arc<dyn ProgressEmitter>,
    model_name: String,
    every: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let mut ticks = interval_at(started + every, every);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticks.tick() => {
                let elapsed = started.elapsed().as_secs();
                emitter.emit(ChannelMessage::progress(
                    "generating",
                    format!("Generating with {model_name}... ({elapsed}s elapsed)"),
                    50,
                ));
            }
        }
    }
}
