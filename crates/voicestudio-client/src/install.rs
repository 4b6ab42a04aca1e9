//! Follows `install_progress` messages for one engine.

use voicestudio_core::InstallProgress;

use crate::hub::{ProgressHub, Subscription};

/// Yields the `install_progress` messages whose `engine` matches, up to and
/// including the first terminal stage.
///
/// Matching is by identifier only. Create the watcher before starting the
/// install so the `starting` message is not missed.
pub struct InstallWatcher {
    engine: String,
    subscription: Subscription,
    finished: bool,
}

impl InstallWatcher {
    pub fn new(hub: &ProgressHub, engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            subscription: hub.subscribe(),
            finished: false,
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Whether a `complete` or `error` stage has been seen.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next matching update, or `None` after the terminal stage.
    pub async fn next(&mut self) -> Option<InstallProgress> {
        if self.finished {
            return None;
        }
        loop {
            let message = self.subscription.recv().await?;
            let Some(progress) = message.as_install_progress() else {
                continue;
            };
            if progress.engine != self.engine {
                continue;
            }
            self.finished = progress.stage.is_terminal();
            return Some(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::FakeTransport;
    use url::Url;
    use voicestudio_core::{ConnectionState, InstallStage, RetryPolicy};

    #[tokio::test(start_paused = true)]
    async fn follows_one_engine_until_terminal_stage() {
        let (transport, mut peers) = FakeTransport::new();
        let hub = ProgressHub::new(
            transport,
            Url::parse("ws://127.0.0.1:8765/api/ws/progress").unwrap(),
            RetryPolicy::default(),
            32,
        );
        let mut watcher = InstallWatcher::new(&hub, "kokoro");
        let peer = peers.recv().await.unwrap();
        hub.watch_status()
            .wait_for(|s| s.state == ConnectionState::Open)
            .await
            .unwrap();

        for raw in [
            r#"{"type":"install_progress","engine":"kokoro","stage":"starting","message":"Preparing to install kokoro..."}"#,
            r#"{"type":"install_progress","engine":"cuda","stage":"installing","message":"other op"}"#,
            r#"{"type":"progress","message":"unrelated"}"#,
            r#"{"type":"install_progress","engine":"kokoro","stage":"reticulating","message":"unknown stage"}"#,
            r#"{"type":"install_progress","engine":"kokoro","stage":"installing","message":"Collecting kokoro"}"#,
            r#"{"type":"install_progress","engine":"kokoro","stage":"complete","message":"done"}"#,
            r#"{"type":"install_progress","engine":"kokoro","stage":"installing","message":"late"}"#,
        ] {
            peer.send(raw);
        }

        let mut stages = Vec::new();
        while let Some(progress) = watcher.next().await {
            stages.push(progress.stage);
        }

        assert_eq!(
            stages,
            vec![
                InstallStage::Starting,
                InstallStage::Installing,
                InstallStage::Complete
            ]
        );
        assert!(watcher.is_finished());
        hub.shutdown().await;
    }
}
