//! `health`, `gpu` and `parler-status` - simple request/response calls.

use anyhow::Result;
use voicestudio_client::VoiceStudioClient;

use crate::presentation::{gpu_lines, parler_lines};

pub async fn health(client: &VoiceStudioClient) -> Result<()> {
    let health = client.health(None).await?;
    println!("Server: {}", health.status);
    match health.gpu_name {
        Some(name) if health.gpu_available => println!("GPU: {name}"),
        _ => println!("GPU: not available"),
    }
    Ok(())
}

pub async fn gpu(client: &VoiceStudioClient) -> Result<()> {
    for line in gpu_lines(&client.gpu_status(None).await?) {
        println!("{line}");
    }
    Ok(())
}

pub async fn parler(client: &VoiceStudioClient) -> Result<()> {
    for line in parler_lines(&client.parler_status(None).await?) {
        println!("{line}");
    }
    Ok(())
}
