//! Voice design (generation from a text description) port.
//!
//! Generation has no deadline. The caller hands in a `CancellationToken`
//! tied to the lifetime of the requesting connection; implementations must
//! stop work promptly once it fires and return [`DesignError::Cancelled`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::ProgressEmitter;
use crate::contracts::{PreviewRequest, VoiceModelInfo};

/// Errors from voice design.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DesignError {
    /// The inference backend is not installed.
    #[error("Parler-TTS is not installed. Run: pip install parler-tts")]
    Unavailable,

    /// The request named a model outside the catalogue.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The requester went away before the preview was ready.
    #[error("Generation cancelled")]
    Cancelled,

    /// Inference failed.
    #[error("{0}")]
    Failed(String),
}

/// A rendered preview on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignedPreview {
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[async_trait]
pub trait VoiceDesignPort: Send + Sync {
    /// Whether the backend can run at all.
    async fn is_available(&self) -> bool;

    /// Models this backend can load.
    fn models(&self) -> Vec<VoiceModelInfo>;

    /// Render `request` to a WAV file at `output`.
    ///
    /// Emits `progress` messages while loading and generating.
    async fn generate_preview(
        &self,
        request: &PreviewRequest,
        output: &Path,
        progress: Arc<dyn ProgressEmitter>,
        cancel: CancellationToken,
    ) -> Result<DesignedPreview, DesignError>;
}
