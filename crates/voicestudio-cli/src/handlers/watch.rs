//! `watch` - print the progress channel.

use anyhow::Result;
use tracing::debug;
use voicestudio_client::VoiceStudioClient;

use crate::presentation::channel_line;

pub async fn execute(client: &VoiceStudioClient, kind: Option<&str>) -> Result<()> {
    let mut subscription = client.hub().subscribe();
    let mut status = client.hub().watch_status();
    client.hub().connect();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *status.borrow_and_update();
                if let Some(line) = channel_line(&snapshot) {
                    eprintln!("{line}");
                }
            }
            message = subscription.recv() => {
                let Some(message) = message else { break };
                if kind.is_some_and(|kind| !message.is(kind)) {
                    debug!(kind = message.kind(), "Filtered out");
                    continue;
                }
                println!("{}", message.encode());
            }
        }
    }
    Ok(())
}
