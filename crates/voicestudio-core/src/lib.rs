#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod channel;
pub mod connection;
pub mod contracts;
pub mod install;
pub mod operation;
pub mod ports;

// Re-export commonly used types for convenience
pub use channel::{ChannelMessage, DecodeError, InstallProgress, InstallStage, ProgressUpdate};
pub use connection::{
    ChannelStateMachine, ChannelStatus, ConnectionState, RetryPolicy, RetryState, Transition,
};
pub use contracts::{
    EngineInfo, EngineInstallResult, ErrorBody, GpuStatus, HealthStatus, ParlerStatus,
    PreviewRequest, PreviewResult, VoiceInfo, VoiceModelInfo, default_voice_model,
    find_voice_model, voice_model_catalog,
};
pub use install::{CUDA_OPERATION, install_packages};
pub use operation::{OperationClass, TimeoutPolicy};
pub use ports::{
    DesignError, DesignedPreview, GpuProbePort, InstallError, NoopProgressEmitter,
    PackageInstallerPort, ProgressEmitter, VoiceDesignPort,
};

#[cfg(test)]
use tokio as _;
