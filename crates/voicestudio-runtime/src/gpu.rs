//! GPU telemetry via `nvidia-smi`.

use std::process::Command;

use tracing::{debug, warn};
use voicestudio_core::{GpuProbePort, GpuStatus};

const QUERY: &str =
    "--query-gpu=name,memory.total,memory.used,memory.free,utilization.gpu,temperature.gpu";

/// Reads the first NVIDIA GPU's state with `nvidia-smi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvidiaSmiProbe;

impl NvidiaSmiProbe {
    pub const fn new() -> Self {
        Self
    }
}

impl GpuProbePort for NvidiaSmiProbe {
    fn gpu_status(&self) -> GpuStatus {
        let output = match Command::new("nvidia-smi")
            .args([QUERY, "--format=csv,noheader,nounits"])
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "nvidia-smi not available");
                return GpuStatus::unavailable("nvidia-smi not found");
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%stderr, "GPU monitoring failed");
            return GpuStatus::unavailable(if stderr.is_empty() {
                format!("nvidia-smi exited with {}", output.status)
            } else {
                stderr
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let status = parse_query(&stdout);
        if let (Some(name), Some(used), Some(total)) =
            (&status.name, status.memory_used_gb, status.memory_total_gb)
        {
            debug!(
                %name,
                "GPU status: VRAM {used:.1}/{total:.1}GB, util={:?}%, temp={:?}C",
                status.gpu_utilization,
                status.temperature_c
            );
        }
        status
    }
}

/// Parse the CSV emitted for [`QUERY`]. Only the first GPU is reported.
fn parse_query(stdout: &str) -> GpuStatus {
    let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return GpuStatus::unavailable("No GPU reported");
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, total, used, free, utilization, temperature] = fields[..] else {
        return GpuStatus::unavailable(format!("Unexpected nvidia-smi output: {line}"));
    };

    let (Some(total_mib), Some(used_mib), Some(free_mib)) = (
        total.parse::<f64>().ok(),
        used.parse::<f64>().ok(),
        free.parse::<f64>().ok(),
    ) else {
        return GpuStatus::unavailable(format!("Unexpected nvidia-smi output: {line}"));
    };

    let memory_percent = if total_mib > 0.0 {
        Some(round1(used_mib / total_mib * 100.0))
    } else {
        None
    };

    GpuStatus {
        available: true,
        name: Some(name.to_string()),
        memory_total_gb: Some(round1(total_mib / 1024.0)),
        memory_used_gb: Some(round1(used_mib / 1024.0)),
        memory_free_gb: Some(round1(free_mib / 1024.0)),
        memory_percent,
        // "[N/A]" on boards without the sensor.
        gpu_utilization: utilization.parse().ok(),
        temperature_c: temperature.parse().ok(),
        error: None,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
