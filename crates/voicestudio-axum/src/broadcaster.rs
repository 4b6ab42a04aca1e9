//! Server side of the event channel.
//!
//! [`ProgressBroadcaster`] implements the core `ProgressEmitter` port. Each
//! emitted message is encoded once and handed to every connected socket task
//! through a broadcast channel. Nothing is buffered for sockets that connect
//! later.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use voicestudio_core::{ChannelMessage, ProgressEmitter};

#[derive(Debug)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl ProgressBroadcaster {
    /// `capacity` bounds how far a slow socket may fall behind before it
    /// starts skipping messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    /// Deliver `message` to every open socket. A no-op when none are open.
    pub fn broadcast(&self, message: &ChannelMessage) {
        let receivers = self.sender.send(message.encode()).unwrap_or(0);
        debug!(kind = message.kind(), receivers, "Broadcast progress");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Register an open socket. The returned guard unregisters it on drop.
    pub fn connect(&self) -> ConnectionGuard {
        let active = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        info!(active, "WebSocket connected");
        ConnectionGuard {
            connections: Arc::clone(&self.connections),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Cancelled when the server starts shutting down. Socket tasks close
    /// their connection when it fires.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl ProgressEmitter for ProgressBroadcaster {
    fn emit(&self, message: ChannelMessage) {
        self.broadcast(&message);
    }
}

/// Keeps a socket counted as connected.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.connections.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(active, "WebSocket disconnected");
    }
}
