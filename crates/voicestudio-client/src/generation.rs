//! Client half of the generation lifecycle.
//!
//! A generation reports progress on the shared broadcast channel but settles
//! on its own HTTP response. [`GenerationHandle`] tracks both: progress
//! updates feed a watch channel that starts out as
//! [`GenerationProgress::Pending`], and only the response decides success or
//! failure.
//!
//! Progress is matched by message type only. Two concurrent generations
//! observe each other's progress.
//!
//! Dropping the handle (or calling [`GenerationHandle::cancel`]) drops the
//! in-flight request. The server treats the closed connection as the signal
//! to abort inference.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use voicestudio_core::{PreviewResult, ProgressUpdate};

use crate::api::{ApiClient, OperationRequest};
use crate::error::{ApiError, ApiResult};
use crate::hub::ProgressHub;

/// What a UI should render for an in-flight generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationProgress {
    /// No progress message yet. Render an indeterminate state.
    Pending,
    /// Latest progress message.
    Reported(ProgressUpdate),
}

impl GenerationProgress {
    /// Completion in `0.0..=1.0`, if known.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Pending => None,
            Self::Reported(update) => update.fraction,
        }
    }

    /// Status line to show.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Reported(update) => Some(&update.message),
        }
    }
}

/// An in-flight generation.
pub struct GenerationHandle {
    progress: watch::Receiver<GenerationProgress>,
    task: Option<JoinHandle<ApiResult<PreviewResult>>>,
    cancel: CancellationToken,
}

impl GenerationHandle {
    /// Subscribe to progress, then issue `request`.
    ///
    /// The subscription is registered before the request is sent so the
    /// first progress message cannot be missed.
    pub fn start(api: &ApiClient, hub: &ProgressHub, request: OperationRequest) -> Self {
        let mut subscription = hub.subscribe();
        let (progress_tx, progress) = watch::channel(GenerationProgress::Pending);
        let cancel = CancellationToken::new();

        let api = api.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let call = api.call_json::<PreviewResult>(request, Some(&token));
            tokio::pin!(call);

            loop {
                tokio::select! {
                    biased;
                    result = &mut call => {
                        match &result {
                            Ok(preview) => info!(audio_url = %preview.audio_url, "Generation finished"),
                            Err(e) if e.is_cancellation() => info!("Generation cancelled"),
                            Err(e) => debug!(error = %e, "Generation failed"),
                        }
                        return result;
                    }
                    Some(message) = subscription.recv() => {
                        if let Some(update) = message.as_progress() {
                            progress_tx.send_replace(GenerationProgress::Reported(update));
                        }
                    }
                }
            }
        });

        Self {
            progress,
            task: Some(task),
            cancel,
        }
    }

    /// Latest progress.
    pub fn progress(&self) -> GenerationProgress {
        self.progress.borrow().clone()
    }

    /// Receiver that observes every progress change.
    pub fn watch_progress(&self) -> watch::Receiver<GenerationProgress> {
        self.progress.clone()
    }

    /// Abandon the generation. [`wait`](Self::wait) then yields
    /// [`ApiError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the original request to settle.
    pub async fn wait(mut self) -> ApiResult<PreviewResult> {
        let Some(task) = self.task.take() else {
            return Err(ApiError::Cancelled);
        };
        // Abandoning this future abandons the generation too.
        let _guard = self.cancel.clone().drop_guard();
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ApiError::Cancelled),
            Err(e) => Err(ApiError::Disconnected(e.to_string())),
        }
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}
