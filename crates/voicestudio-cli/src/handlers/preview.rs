//! `preview` - one voice generation with live progress.
//!
//! The request has no deadline. Ctrl+C drops it, which the server takes as
//! the signal to stop inference.

use anyhow::Result;
use voicestudio_client::{ApiError, VoiceStudioClient};
use voicestudio_core::PreviewRequest;

use crate::presentation::{generation_line, spinner};

pub async fn execute(client: &VoiceStudioClient, request: PreviewRequest) -> Result<()> {
    let generation = client.preview_from_prompt(&request);
    let mut progress = generation.watch_progress();

    let pb = spinner(&generation_line(&generation.progress()));
    let wait = generation.wait();
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            result = &mut wait => break Some(result),
            _ = tokio::signal::ctrl_c() => break None,
            Ok(()) = progress.changed() => {
                pb.set_message(generation_line(&progress.borrow_and_update()));
            }
        }
    };
    pb.finish_and_clear();

    match outcome {
        Some(Ok(preview)) => {
            println!("Preview ready ({:.1}s): {}", preview.duration, preview.audio_url);
            Ok(())
        }
        Some(Err(ApiError::Cancelled)) | None => {
            println!("Generation cancelled");
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
    }
}
