//! Terminal formatting.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use voicestudio_client::{ChannelStatus, ConnectionState, GenerationProgress, InstallProgress};
use voicestudio_core::{GpuStatus, InstallStage, ParlerStatus};

/// Spinner for indeterminate progress.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Status line for a running generation.
pub fn generation_line(progress: &GenerationProgress) -> String {
    match progress {
        GenerationProgress::Pending => "Waiting for the server...".to_string(),
        GenerationProgress::Reported(update) => match update.fraction {
            Some(fraction) => format!("{:>3.0}% {}", fraction * 100.0, update.message),
            None => update.message.clone(),
        },
    }
}

pub fn install_line(progress: &InstallProgress) -> String {
    let marker = match progress.stage {
        InstallStage::Starting => "==>",
        InstallStage::Installing => "   ",
        InstallStage::Complete => "[ok]",
        InstallStage::Error => "[error]",
    };
    format!("{marker} {}", progress.message)
}

/// One-line description of the event channel, for `watch`.
pub fn channel_line(status: &ChannelStatus) -> Option<String> {
    match status.state {
        ConnectionState::Open => Some("Connected to progress channel".to_string()),
        ConnectionState::Retrying => status
            .retry
            .last_delay
            .map(|delay| {
                format!(
                    "Connection lost; retry {} in {:.1}s",
                    status.retry.attempt,
                    delay.as_secs_f64()
                )
            }),
        ConnectionState::Closed => Some("Live progress unavailable".to_string()),
        ConnectionState::Connecting => None,
    }
}

pub fn gpu_lines(status: &GpuStatus) -> Vec<String> {
    if !status.available {
        return vec![format!(
            "GPU: not available ({})",
            status.error.as_deref().unwrap_or("unknown reason")
        )];
    }

    let mut lines = vec![format!("GPU: {}", status.name.as_deref().unwrap_or("unknown"))];
    if let (Some(used), Some(total)) = (status.memory_used_gb, status.memory_total_gb) {
        let percent = status
            .memory_percent
            .map(|p| format!(" ({p:.1}%)"))
            .unwrap_or_default();
        lines.push(format!("VRAM: {used:.1} / {total:.1} GB{percent}"));
    }
    if let Some(util) = status.gpu_utilization {
        lines.push(format!("Utilization: {util}%"));
    }
    if let Some(temp) = status.temperature_c {
        lines.push(format!("Temperature: {temp}°C"));
    }
    lines
}

pub fn parler_lines(status: &ParlerStatus) -> Vec<String> {
    if !status.available {
        return vec!["Voice design: not installed (pip install parler-tts)".to_string()];
    }
    let mut lines = vec!["Voice design: available".to_string()];
    for model in &status.models {
        let default = if model.default { " (default)" } else { "" };
        lines.push(format!(
            "  {:<18} {}{default} - {:.1} GB VRAM, {:.1} GB download",
            model.id, model.name, model.vram_gb, model.download_gb
        ));
    }
    lines
}
