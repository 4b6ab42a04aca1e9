//! Shared broadcast context for the progress channel.
//!
//! One [`ProgressHub`] per process or session. It owns the single
//! [`ReconnectingChannel`], created lazily on first use, and fans out every
//! decoded message to all current subscribers. Subscribers never touch the
//! socket; they only see read-only `Arc<ChannelMessage>` views.
//!
//! # Delivery
//!
//! - Each subscriber sees messages in arrival order.
//! - A subscriber only sees messages that arrived while it was registered.
//!   There is no replay after a reconnect.
//! - A subscriber that falls more than `broadcast_capacity` messages behind
//!   skips the oldest ones and carries on. [`Subscription::skipped`] reports
//!   how many it has missed so far.

use std::sync::{Arc, OnceLock};

use futures_util::Stream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use voicestudio_core::{ChannelMessage, ChannelStatus, ConnectionState, RetryPolicy};

use crate::channel::ReconnectingChannel;
use crate::transport::Transport;

/// The shared broadcast context.
pub struct ProgressHub {
    transport: Arc<dyn Transport>,
    url: Url,
    policy: RetryPolicy,
    sender: broadcast::Sender<Arc<ChannelMessage>>,
    channel: OnceLock<ReconnectingChannel>,
}

impl ProgressHub {
    /// Create the hub. No connection is made until first use.
    pub fn new(
        transport: Arc<dyn Transport>,
        url: Url,
        policy: RetryPolicy,
        capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            transport,
            url,
            policy,
            sender,
            channel: OnceLock::new(),
        }
    }

    fn channel(&self) -> &ReconnectingChannel {
        self.channel.get_or_init(|| {
            debug!(url = %self.url, "Starting shared progress channel");
            ReconnectingChannel::spawn(
                Arc::clone(&self.transport),
                self.url.clone(),
                self.policy,
                self.sender.clone(),
            )
        })
    }

    /// Register a pull-style subscriber. Dropping it unregisters.
    pub fn subscribe(&self) -> Subscription {
        let receiver = self.sender.subscribe();
        self.channel();
        Subscription {
            receiver,
            skipped: 0,
        }
    }

    /// Register a callback subscriber.
    ///
    /// The callback runs on a dedicated task, once per message, in arrival
    /// order. After [`CallbackSubscription::unsubscribe`] returns it is never
    /// invoked again.
    pub fn subscribe_with<F>(&self, mut callback: F) -> CallbackSubscription
    where
        F: FnMut(&ChannelMessage) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    message = subscription.recv() => match message {
                        Some(message) if !token.is_cancelled() => callback(message.as_ref()),
                        _ => break,
                    },
                }
            }
        });

        CallbackSubscription {
            cancel,
            task: Some(task),
        }
    }

    /// Ask the channel to connect. See [`ReconnectingChannel::connect`].
    pub fn connect(&self) {
        self.channel().connect();
    }

    /// Send a message if the channel is open. Returns `false` if dropped.
    pub fn send(&self, message: &ChannelMessage) -> bool {
        self.channel().send(message)
    }

    pub fn status(&self) -> ChannelStatus {
        self.channel().status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.channel().watch_status()
    }

    /// Whether live progress is currently flowing.
    ///
    /// When this is false because retries ran out, consumers should show
    /// "live progress unavailable" and let their operations carry on.
    pub fn is_live(&self) -> bool {
        self.channel
            .get()
            .is_some_and(|channel| channel.state() == ConnectionState::Open)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Tear the channel down. Subscribers stay registered but receive
    /// nothing further.
    pub async fn shutdown(&self) {
        if let Some(channel) = self.channel.get() {
            channel.teardown().await;
        }
    }
}

/// A registered pull-style subscriber.
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<ChannelMessage>>,
    skipped: u64,
}

impl Subscription {
    /// Next message, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<ChannelMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.skipped = self.skipped.saturating_add(skipped);
                    warn!(
                        skipped,
                        total = self.skipped,
                        "Progress subscriber lagged, skipping messages"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Messages this subscriber has missed by falling behind.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Convert into a stream, skipping over lag gaps.
    pub fn into_stream(self) -> impl Stream<Item = Arc<ChannelMessage>> + Send + 'static {
        BroadcastStream::new(self.receiver).filter_map(|result| match result {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("Progress stream error: {}", e);
                None
            }
        })
    }
}

/// A registered callback subscriber.
///
/// Dropping it stops delivery without waiting; use
/// [`unsubscribe`](Self::unsubscribe) to wait for an in-flight callback.
pub struct CallbackSubscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CallbackSubscription {
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Progress callback panicked");
            }
        }
    }
}

impl Drop for CallbackSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
