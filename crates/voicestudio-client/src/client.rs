//! The client facade.
//!
//! [`VoiceStudioClient`] bundles the shared [`ProgressHub`] with an
//! [`ApiClient`] and gives every server operation a typed method. Each method
//! declares its [`OperationClass`] here, once, so call sites never pick a
//! timeout themselves.
//!
//! Bounded calls take an optional [`CancellationToken`]. Firing it rejects
//! the call with [`ApiError::Cancelled`](crate::ApiError::Cancelled) unless
//! the deadline or the response got there first.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use voicestudio_core::{
    EngineInfo, EngineInstallResult, GpuStatus, HealthStatus, OperationClass, ParlerStatus,
    PreviewRequest, VoiceInfo, CUDA_OPERATION,
};

use crate::api::{ApiClient, OperationRequest};
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::generation::GenerationHandle;
use crate::hub::ProgressHub;
use crate::install::InstallWatcher;
use crate::transport::{Transport, WsTransport};

/// Entry point for talking to a voicestudio server.
///
/// Create one per process. The hub owns the only socket, so share the
/// client behind an `Arc` rather than building a second one.
pub struct VoiceStudioClient {
    config: ClientConfig,
    api: ApiClient,
    hub: ProgressHub,
}

impl VoiceStudioClient {
    /// Client over the production WebSocket transport.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Self::with_transport(config, Arc::new(WsTransport::new()))
    }

    /// Client over a custom event-channel transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> ApiResult<Self> {
        let api = ApiClient::new(config.base_url()?, config.timeouts())?;
        let hub = ProgressHub::new(
            transport,
            config.channel_url()?,
            config.retry_policy(),
            config.broadcast_capacity,
        );
        Ok(Self { config, api, hub })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared broadcast context.
    pub const fn hub(&self) -> &ProgressHub {
        &self.hub
    }

    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    // ── Default class ──────────────────────────────────────────────────

    pub async fn health(&self, cancel: Option<&CancellationToken>) -> ApiResult<HealthStatus> {
        self.get("/health", cancel).await
    }

    pub async fn gpu_status(&self, cancel: Option<&CancellationToken>) -> ApiResult<GpuStatus> {
        self.get("/gpu/status", cancel).await
    }

    pub async fn parler_status(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<ParlerStatus> {
        self.get("/voices/create/parler-status", cancel).await
    }

    pub async fn list_engines(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Vec<EngineInfo>> {
        self.get("/tts/engines", cancel).await
    }

    pub async fn list_voices(&self, cancel: Option<&CancellationToken>) -> ApiResult<Vec<VoiceInfo>> {
        self.get("/voices", cancel).await
    }

    pub async fn delete_voice(&self, id: &str, cancel: Option<&CancellationToken>) -> ApiResult<()> {
        let request = OperationRequest::delete(
            self.config.api_path(&format!("/voices/{id}")),
            OperationClass::Default,
        );
        self.api.call(request, cancel).await.map(drop)
    }

    // ── Long class ─────────────────────────────────────────────────────

    /// Install a TTS engine. Pair with [`watch_install`](Self::watch_install)
    /// for live output.
    pub async fn install_engine(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<EngineInstallResult> {
        info!(engine = name, "Requesting engine install");
        let request = OperationRequest::post(
            self.config.api_path(&format!("/tts/engines/install/{name}")),
            OperationClass::Long,
        );
        self.api.call_json(request, cancel).await
    }

    /// Reinstall PyTorch with CUDA support. Progress arrives under the
    /// `cuda` identifier.
    pub async fn fix_cuda(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<EngineInstallResult> {
        info!(operation = CUDA_OPERATION, "Requesting CUDA repair");
        let request =
            OperationRequest::post(self.config.api_path("/gpu/fix-cuda"), OperationClass::Long);
        self.api.call_json(request, cancel).await
    }

    /// Follow `install_progress` for `engine`. Create it before starting the
    /// operation.
    pub fn watch_install(&self, engine: &str) -> InstallWatcher {
        InstallWatcher::new(&self.hub, engine)
    }

    // ── Unbounded class ────────────────────────────────────────────────

    /// Start designing a voice preview from a text prompt.
    ///
    /// No deadline applies; the generation ends when the server answers or
    /// the handle is cancelled or dropped.
    pub fn preview_from_prompt(&self, request: &PreviewRequest) -> GenerationHandle {
        let operation = OperationRequest::post(
            self.config.api_path("/voices/create/preview-from-prompt"),
            OperationClass::Unbounded,
        )
        .with_form(request.to_form());
        GenerationHandle::start(&self.api, &self.hub, operation)
    }

    /// Tear down the event channel.
    pub async fn shutdown(&self) {
        self.hub.shutdown().await;
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<T> {
        let request = OperationRequest::get(self.config.api_path(path), OperationClass::Default);
        self.api.call_json(request, cancel).await
    }
}
