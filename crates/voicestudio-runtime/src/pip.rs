//! pip-backed engine installer and CUDA repair.
//!
//! Every pip invocation streams its output as `install_progress` messages
//! tagged with the operation identifier: the engine name for installs,
//! `cuda` for the repair.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};
use voicestudio_core::install::{
    CUDA_WHEEL_INDEX, error_tail, install_packages, is_permission_error, is_windows_lock_error,
    windows_lock_hint,
};
use voicestudio_core::{
    CUDA_OPERATION, ChannelMessage, EngineInstallResult, InstallError, InstallStage,
    PackageInstallerPort, ProgressEmitter,
};

use crate::python::{ProcessOutput, python_eval, run_streaming};

const CUDA_PROBE: &str = "import torch; print(torch.cuda.is_available())";

/// Installs engine packages with `python -m pip`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: PathBuf,
}

impl PipInstaller {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &std::path::Path {
        &self.python
    }

    /// Run pip, streaming each output line as an `installing` message.
    async fn run_pip(
        &self,
        args: &[&str],
        operation: &str,
        progress: &dyn ProgressEmitter,
    ) -> Result<ProcessOutput, InstallError> {
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "pip"]).args(args).arg("--no-input");

        run_streaming(cmd, |line| {
            progress.emit(ChannelMessage::install_progress(
                operation,
                InstallStage::Installing,
                line,
            ));
        })
        .await
        .map_err(|e| InstallError::Failed(e.to_string()))
    }

    async fn cuda_available(&self) -> bool {
        python_eval(&self.python, CUDA_PROBE)
            .await
            .is_some_and(|out| out == "True")
    }

    async fn install_inner(
        &self,
        engine: &str,
        packages: &[&str],
        progress: &dyn ProgressEmitter,
    ) -> Result<EngineInstallResult, InstallError> {
        let announce = |message: &str| {
            progress.emit(ChannelMessage::install_progress(
                engine,
                InstallStage::Installing,
                message,
            ));
        };

        // An old pip handles locked files on Windows much worse.
        announce("Upgrading pip...");
        let upgrade = self
            .run_pip(&["install", "--upgrade", "pip"], engine, progress)
            .await?;
        if !upgrade.success() {
            warn!(engine, "pip upgrade failed, continuing anyway");
        }

        announce(&format!("Installing {engine}..."));
        let mut args = vec!["install"];
        args.extend_from_slice(packages);
        args.push("--no-cache-dir");
        let mut output = self.run_pip(&args, engine, progress).await?;

        if !output.success() && is_permission_error(&output.joined()) {
            warn!(engine, "Permission error during install, retrying with --no-deps");
            announce("Locked files detected, retrying without upgrading existing packages...");
            args.push("--no-deps");
            output = self.run_pip(&args, engine, progress).await?;
        }

        if output.success() {
            info!(engine, "Engine installed");
            progress.emit(ChannelMessage::install_progress(
                engine,
                InstallStage::Complete,
                format!("{engine} installed successfully! Restart the server to activate."),
            ));
            return Ok(EngineInstallResult::ok(Some(engine), "Installed successfully"));
        }

        error!(engine, status = %output.status, "Engine install failed");
        let message = if is_windows_lock_error(&output.joined()) {
            windows_lock_hint(packages)
        } else {
            error_tail(&output.lines)
        };
        Err(InstallError::Failed(message))
    }

    async fn fix_cuda_inner(
        &self,
        progress: &dyn ProgressEmitter,
    ) -> Result<EngineInstallResult, InstallError> {
        let announce = |message: &str| {
            progress.emit(ChannelMessage::install_progress(
                CUDA_OPERATION,
                InstallStage::Installing,
                message,
            ));
        };

        announce("Removing CPU-only PyTorch...");
        let uninstall = self
            .run_pip(&["uninstall", "torch", "torchaudio", "-y"], CUDA_OPERATION, progress)
            .await?;
        if !uninstall.success() {
            warn!("torch uninstall returned non-zero, continuing anyway");
        }

        announce("Downloading PyTorch with CUDA 12.1 (this may take a few minutes)...");
        let output = self
            .run_pip(
                &[
                    "install",
                    "torch",
                    "torchaudio",
                    "--index-url",
                    CUDA_WHEEL_INDEX,
                    "--no-cache-dir",
                ],
                CUDA_OPERATION,
                progress,
            )
            .await?;

        if output.success() {
            info!("PyTorch with CUDA installed");
            progress.emit(ChannelMessage::install_progress(
                CUDA_OPERATION,
                InstallStage::Complete,
                "PyTorch CUDA installed! Restart the server for changes to take effect.",
            ));
            Ok(EngineInstallResult::ok(
                None,
                "PyTorch CUDA installed. Restart required.",
            ))
        } else {
            error!(status = %output.status, "CUDA PyTorch install failed");
            Err(InstallError::Failed(error_tail(&output.lines)))
        }
    }
}

#[async_trait]
impl PackageInstallerPort for PipInstaller {
    async fn install_engine(
        &self,
        engine: &str,
        progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError> {
        let packages =
            install_packages(engine).ok_or_else(|| InstallError::UnknownPackage(engine.to_string()))?;

        info!(engine, ?packages, "Installing engine packages");
        progress.emit(ChannelMessage::install_progress(
            engine,
            InstallStage::Starting,
            format!("Preparing to install {engine}..."),
        ));

        let result = self.install_inner(engine, packages, progress.as_ref()).await;
        if let Err(e) = &result {
            progress.emit(ChannelMessage::install_progress(
                engine,
                InstallStage::Error,
                e.to_string(),
            ));
        }
        result
    }

    async fn fix_cuda(
        &self,
        progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError> {
        if self.cuda_available().await {
            return Ok(EngineInstallResult::ok(None, "CUDA is already available"));
        }

        info!("Reinstalling PyTorch with CUDA support");
        progress.emit(ChannelMessage::install_progress(
            CUDA_OPERATION,
            InstallStage::Starting,
            "Reinstalling PyTorch with CUDA support...",
        ));

        let result = self.fix_cuda_inner(progress.as_ref()).await;
        if let Err(e) = &result {
            progress.emit(ChannelMessage::install_progress(
                CUDA_OPERATION,
                InstallStage::Error,
                e.to_string(),
            ));
        }
        result
    }
}
