//! Port definitions for the server-side collaborators.
//!
//! The progress subsystem treats inference, package installation and GPU
//! telemetry as opaque operations. These traits describe exactly what it
//! needs from them; implementations live in `voicestudio-runtime`.
//!
//! # Design Rules
//!
//! - No process or filesystem implementation details in signatures
//! - Long-running operations report progress through a [`ProgressEmitter`]
//! - Cancellable operations take a `CancellationToken`

pub mod gpu_probe;
pub mod package_installer;
pub mod progress_emitter;
pub mod voice_design;

pub use gpu_probe::GpuProbePort;
pub use package_installer::{InstallError, PackageInstallerPort};
pub use progress_emitter::{NoopProgressEmitter, ProgressEmitter};
pub use voice_design::{DesignError, DesignedPreview, VoiceDesignPort};
