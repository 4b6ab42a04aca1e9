//! `install` and `fix-cuda` - long operations that stream `install_progress`.
//!
//! Ctrl+C fires the call's cancellation token, so the command reports the
//! abandoned operation as cancelled rather than failed.

use std::future::Future;

use anyhow::Result;
use voicestudio_client::{ApiError, ApiResult, CancellationToken, InstallWatcher, VoiceStudioClient};
use voicestudio_core::{CUDA_OPERATION, EngineInstallResult};

use crate::presentation::{install_line, spinner};

pub async fn install(client: &VoiceStudioClient, engine: &str) -> Result<()> {
    let watcher = client.watch_install(engine);
    let cancel = CancellationToken::new();
    run(
        watcher,
        client.install_engine(engine, Some(&cancel)),
        &cancel,
        &format!("Installing {engine}..."),
    )
    .await
}

pub async fn fix_cuda(client: &VoiceStudioClient) -> Result<()> {
    let watcher = client.watch_install(CUDA_OPERATION);
    let cancel = CancellationToken::new();
    run(watcher, client.fix_cuda(Some(&cancel)), &cancel, "Repairing CUDA...").await
}

/// Drive `call` to completion while echoing the watcher's messages.
///
/// The call's result decides success; progress is informational and may be
/// missing entirely if the channel is down.
async fn run(
    mut watcher: InstallWatcher,
    call: impl Future<Output = ApiResult<EngineInstallResult>>,
    cancel: &CancellationToken,
    label: &str,
) -> Result<()> {
    let pb = spinner(label);
    tokio::pin!(call);

    let result = loop {
        tokio::select! {
            result = &mut call => break result,
            Ok(()) = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => cancel.cancel(),
            Some(progress) = watcher.next(), if !watcher.is_finished() => {
                pb.println(install_line(&progress));
            }
        }
    };
    pb.finish_and_clear();

    match result {
        Ok(result) => {
            println!("{}", result.message);
            Ok(())
        }
        Err(ApiError::Cancelled) => {
            println!("Cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
