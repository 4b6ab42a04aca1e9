//! Fake backends shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use voicestudio_axum::{AxumContext, ServerConfig};
use voicestudio_core::{
    ChannelMessage, DesignError, DesignedPreview, EngineInstallResult, GpuProbePort, GpuStatus,
    InstallError, InstallStage, PackageInstallerPort, PreviewRequest, ProgressEmitter,
    VoiceDesignPort, VoiceModelInfo, install_packages, voice_model_catalog,
};

/// Design backend whose runs are released or cancelled by the test.
#[derive(Default)]
pub struct ScriptedDesigner {
    pub unavailable: AtomicBool,
    /// Lets the current run finish.
    pub release: Notify,
    /// Notified when a run observes its cancellation token.
    pub cancelled: Notify,
}

#[async_trait]
impl VoiceDesignPort for ScriptedDesigner {
    async fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn models(&self) -> Vec<VoiceModelInfo> {
        voice_model_catalog()
    }

    async fn generate_preview(
        &self,
        request: &PreviewRequest,
        output: &Path,
        progress: Arc<dyn ProgressEmitter>,
        cancel: CancellationToken,
    ) -> Result<DesignedPreview, DesignError> {
        progress.emit(ChannelMessage::progress(
            "loading_model",
            format!("Loading {}...", request.model_id),
            10,
        ));

        tokio::select! {
            () = cancel.cancelled() => {
                self.cancelled.notify_one();
                Err(DesignError::Cancelled)
            }
            () = self.release.notified() => {
                if let Some(dir) = output.parent() {
                    tokio::fs::create_dir_all(dir).await.map_err(|e| DesignError::Failed(e.to_string()))?;
                }
                tokio::fs::write(output, b"RIFF").await.map_err(|e| DesignError::Failed(e.to_string()))?;
                Ok(DesignedPreview { path: output.to_path_buf(), duration_secs: 2.5 })
            }
        }
    }
}

/// Installer that reports the usual stages without touching pip.
pub struct FakeInstaller;

#[async_trait]
impl PackageInstallerPort for FakeInstaller {
    async fn install_engine(
        &self,
        engine: &str,
        progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError> {
        if install_packages(engine).is_none() {
            return Err(InstallError::UnknownPackage(engine.to_string()));
        }
        for (stage, message) in [
            (InstallStage::Starting, format!("Preparing to install {engine}...")),
            (InstallStage::Installing, "Collecting packages".to_string()),
            (InstallStage::Complete, format!("{engine} installed successfully!")),
        ] {
            progress.emit(ChannelMessage::install_progress(engine, stage, message));
        }
        Ok(EngineInstallResult::ok(Some(engine), "Installed successfully"))
    }

    async fn fix_cuda(
        &self,
        _progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError> {
        Ok(EngineInstallResult::ok(None, "CUDA is already available"))
    }
}

pub struct FakeGpu;

impl GpuProbePort for FakeGpu {
    fn gpu_status(&self) -> GpuStatus {
        GpuStatus {
            available: true,
            name: Some("Test GPU".to_string()),
            ..GpuStatus::default()
        }
    }
}

pub fn context(config: ServerConfig, designer: Arc<ScriptedDesigner>) -> AxumContext {
    AxumContext::new(config, designer, Arc::new(FakeInstaller), Arc::new(FakeGpu))
}
