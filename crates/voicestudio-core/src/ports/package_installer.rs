//! Engine installer port.
//!
//! Both operations are long-running and stream `install_progress` messages
//! through the supplied emitter; the returned result is the authoritative
//! outcome.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::ProgressEmitter;
use crate::contracts::EngineInstallResult;

/// Errors from install and repair operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    /// The name is not in the install table.
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// The package manager failed. The message is shown to the user as-is.
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait PackageInstallerPort: Send + Sync {
    /// Install the pip packages for `engine`.
    async fn install_engine(
        &self,
        engine: &str,
        progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError>;

    /// Replace a CPU-only PyTorch with the CUDA build.
    async fn fix_cuda(
        &self,
        progress: Arc<dyn ProgressEmitter>,
    ) -> Result<EngineInstallResult, InstallError>;
}
