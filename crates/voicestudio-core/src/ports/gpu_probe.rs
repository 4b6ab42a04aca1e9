//! GPU telemetry port.

use crate::contracts::GpuStatus;

/// Reads the current state of the primary GPU.
///
/// Probing failures are reported in-band as `GpuStatus { available: false,
/// error: Some(..) }`, never as an error.
pub trait GpuProbePort: Send + Sync {
    fn gpu_status(&self) -> GpuStatus;
}
