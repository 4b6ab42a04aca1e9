//! Reconnecting event channel.
//!
//! [`ReconnectingChannel`] is a handle to a background task that owns the one
//! socket to the progress endpoint. The task feeds connection events into the
//! core [`ChannelStateMachine`] and carries out what it decides: open a new
//! connection, wait out a backoff delay, or give up. Decoded messages are
//! published on a broadcast sender supplied by the owner.
//!
//! Every wait in the task selects on the shutdown token first, so once
//! [`ReconnectingChannel::teardown`] returns no reconnect timer can fire.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use voicestudio_core::{
    ChannelMessage, ChannelStateMachine, ChannelStatus, ConnectionState, RetryPolicy, Transition,
};

use crate::transport::{Transport, TransportConnection};

enum Command {
    Connect,
    Send(String),
}

/// Handle to the reconnecting channel task.
///
/// Dropping the handle stops the task without waiting for it.
pub struct ReconnectingChannel {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    unmounted: Arc<AtomicBool>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectingChannel {
    /// Start the channel. The first connection attempt begins immediately.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        url: Url,
        policy: RetryPolicy,
        sink: broadcast::Sender<Arc<ChannelMessage>>,
    ) -> Self {
        let machine = ChannelStateMachine::new(policy);
        let (status_tx, status_rx) = watch::channel(machine.status());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let unmounted = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let worker = Worker {
            transport,
            url,
            machine,
            commands: command_rx,
            status: status_tx,
            unmounted: Arc::clone(&unmounted),
            shutdown: shutdown.clone(),
            sink,
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands: command_tx,
            status: status_rx,
            unmounted,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Ask for a connection.
    ///
    /// A no-op while connecting, open or waiting to retry. After retries
    /// were exhausted this starts a fresh session.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Send a message if the channel is open.
    ///
    /// Returns `false` and drops the message otherwise. Nothing is queued for
    /// later delivery.
    pub fn send(&self, message: &ChannelMessage) -> bool {
        if self.is_unmounted() || !self.status.borrow().state.is_open() {
            debug!(kind = message.kind(), "Dropping outbound message: channel not open");
            return false;
        }
        self.commands.send(Command::Send(message.encode())).is_ok()
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Receiver that observes every state change.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::SeqCst)
    }

    /// Close the channel for good.
    ///
    /// Sets the unmounted flag before anything is closed, cancels a pending
    /// retry and waits for the task to exit. Safe to call more than once.
    pub async fn teardown(&self) {
        self.unmounted.store(true, Ordering::SeqCst);
        self.shutdown.cancel();

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Progress channel task ended abnormally");
            }
        }
    }
}

impl Drop for ReconnectingChannel {
    fn drop(&mut self) {
        self.unmounted.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

// ============================================================================
// Worker
// ============================================================================

enum OpenEvent {
    Shutdown,
    Command(Option<Command>),
    Frame(Option<Result<String, crate::error::TransportError>>),
}

struct Worker {
    transport: Arc<dyn Transport>,
    url: Url,
    machine: ChannelStateMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ChannelStatus>,
    unmounted: Arc<AtomicBool>,
    shutdown: CancellationToken,
    sink: broadcast::Sender<Arc<ChannelMessage>>,
}

impl Worker {
    async fn run(mut self) {
        let mut connection: Option<Box<dyn TransportConnection>> = None;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let keep_going = match self.machine.state() {
                ConnectionState::Connecting => self.connecting(&mut connection).await,
                ConnectionState::Open => self.open(&mut connection).await,
                ConnectionState::Retrying => self.retrying().await,
                ConnectionState::Closed => self.closed().await,
            };
            self.publish();
            if !keep_going {
                break;
            }
        }

        self.machine.teardown();
        if let Some(mut conn) = connection.take() {
            conn.close().await;
        }
        self.publish();
        debug!(url = %self.url, "Progress channel torn down");
    }

    /// Runs one connection attempt. Returns `false` on shutdown.
    async fn connecting(&mut self, connection: &mut Option<Box<dyn TransportConnection>>) -> bool {
        debug!(
            url = %self.url,
            attempt = self.machine.retry().attempt,
            "Connecting to progress channel"
        );

        let transport = Arc::clone(&self.transport);
        let url = self.url.clone();
        let attempt = async move { transport.connect(&url).await };
        tokio::pin!(attempt);

        let result = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return false,
                command = self.commands.recv() => match command {
                    None => return false,
                    // Already connecting.
                    Some(Command::Connect) => {}
                    Some(Command::Send(_)) => debug!("Dropping outbound message: channel not open"),
                },
                result = &mut attempt => break result,
            }
        };

        match result {
            Ok(mut conn) => {
                if self.machine.on_open() {
                    info!(url = %self.url, "Progress channel open");
                    *connection = Some(conn);
                } else {
                    conn.close().await;
                }
            }
            Err(e) => {
                debug!(error = %e, "Progress channel connection attempt failed");
                self.on_unplanned_close();
            }
        }
        true
    }

    /// Serves an open connection until it closes. Returns `false` on shutdown.
    async fn open(&mut self, connection: &mut Option<Box<dyn TransportConnection>>) -> bool {
        let Some(conn) = connection.as_mut() else {
            self.on_unplanned_close();
            return true;
        };

        let event = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => OpenEvent::Shutdown,
            command = self.commands.recv() => OpenEvent::Command(command),
            frame = conn.next_text() => OpenEvent::Frame(frame),
        };

        match event {
            OpenEvent::Shutdown | OpenEvent::Command(None) => return false,
            OpenEvent::Command(Some(Command::Connect)) => {}
            OpenEvent::Command(Some(Command::Send(text))) => {
                if let Err(e) = conn.send_text(text).await {
                    warn!(error = %e, "Progress channel send failed");
                    *connection = None;
                    self.on_unplanned_close();
                }
            }
            OpenEvent::Frame(Some(Ok(text))) => self.deliver(&text),
            OpenEvent::Frame(Some(Err(e))) => {
                warn!(error = %e, "Progress channel read failed");
                *connection = None;
                self.on_unplanned_close();
            }
            OpenEvent::Frame(None) => {
                *connection = None;
                self.on_unplanned_close();
            }
        }
        true
    }

    /// Waits out the backoff delay. Returns `false` on shutdown.
    async fn retrying(&mut self) -> bool {
        let delay = self.machine.retry().last_delay.unwrap_or_default();
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return false,
                command = self.commands.recv() => match command {
                    None => return false,
                    // The pending timer already covers this.
                    Some(Command::Connect) => {}
                    Some(Command::Send(_)) => debug!("Dropping outbound message: channel not open"),
                },
                () = &mut timer => break,
            }
        }

        self.machine.on_retry_elapsed();
        true
    }

    /// Idles until an explicit connect. Returns `false` on shutdown.
    async fn closed(&mut self) -> bool {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => false,
            command = self.commands.recv() => match command {
                None => false,
                Some(Command::Connect) => {
                    if self.machine.request_connect() {
                        info!(url = %self.url, "Restarting progress channel");
                    }
                    true
                }
                Some(Command::Send(_)) => {
                    debug!("Dropping outbound message: channel closed");
                    true
                }
            },
        }
    }

    fn on_unplanned_close(&mut self) {
        // A close racing with teardown schedules nothing and leaves the
        // machine closed, so the loop parks until the shutdown token fires.
        if self.unmounted.load(Ordering::SeqCst) {
            self.machine.teardown();
            return;
        }

        match self.machine.on_close() {
            Transition::Retry { attempt, delay } => {
                warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Progress channel disconnected, scheduling reconnect"
                );
            }
            Transition::GiveUp => {
                error!(
                    max_retries = self.machine.policy().max_retries(),
                    "Progress channel retries exhausted, live progress unavailable"
                );
            }
            Transition::Ignored => {}
        }
    }

    fn deliver(&self, text: &str) {
        match ChannelMessage::decode(text) {
            Ok(message) => {
                // No subscribers is fine.
                let _ = self.sink.send(Arc::new(message));
            }
            Err(e) => debug!(error = %e, "Dropping malformed channel message"),
        }
    }

    fn publish(&self) {
        self.status.send_if_modified(|current| {
            let next = self.machine.status();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{FakeTransport, Outcome};
    use std::time::Duration;
    use tokio::time::Instant;

    fn url() -> Url {
        Url::parse("ws://127.0.0.1:8765/api/ws/progress").unwrap()
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(40), max_retries)
    }

    async fn wait_for_state(
        status: &mut watch::Receiver<ChannelStatus>,
        state: ConnectionState,
    ) -> ChannelStatus {
        *status.wait_for(|s| s.state == state).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_schedules_retry_after_one_second() {
        let (transport, mut peers) = FakeTransport::new();
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();

        let peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;

        let closed_at = Instant::now();
        drop(peer);

        let retrying = wait_for_state(&mut status, ConnectionState::Retrying).await;
        assert_eq!(retrying.retry.attempt, 1);
        assert_eq!(retrying.retry.last_delay, Some(Duration::from_millis(1_000)));

        let _peer = peers.recv().await.unwrap();
        let open = wait_for_state(&mut status, ConnectionState::Open).await;
        assert_eq!(open.retry.attempt, 0);

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 2);
        let waited = attempts[1] - closed_at;
        assert!(waited >= Duration::from_millis(1_000), "{waited:?}");
        assert!(waited < Duration::from_millis(1_100), "{waited:?}");

        channel.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_until_retries_are_exhausted() {
        let (transport, _peers) = FakeTransport::new();
        transport.set_fallback(Outcome::Refuse);
        let (sink, _) = broadcast::channel(16);
        let started = Instant::now();
        let channel = ReconnectingChannel::spawn(transport.clone(), url(), fast_policy(3), sink);
        let mut status = channel.watch_status();

        wait_for_state(&mut status, ConnectionState::Closed).await;

        let offsets: Vec<Duration> = transport
            .attempts()
            .iter()
            .map(|t| *t - started)
            .collect();
        // initial attempt, then 10, 20 and 40 ms later
        assert_eq!(offsets.len(), 4);
        let gaps: Vec<u128> = offsets.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps, vec![10, 20, 40]);

        // Nothing further is scheduled.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.attempts().len(), 4);
        assert_eq!(channel.state(), ConnectionState::Closed);

        channel.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn connect_after_giving_up_starts_a_fresh_session() {
        let (transport, mut peers) = FakeTransport::new();
        transport.script([Outcome::Refuse, Outcome::Refuse]);
        let (sink, _) = broadcast::channel(16);
        let channel = ReconnectingChannel::spawn(transport.clone(), url(), fast_policy(1), sink);
        let mut status = channel.watch_status();

        wait_for_state(&mut status, ConnectionState::Closed).await;
        assert_eq!(transport.attempts().len(), 2);

        channel.connect();
        let _peer = peers.recv().await.unwrap();
        let open = wait_for_state(&mut status, ConnectionState::Open).await;
        assert_eq!(open.retry.attempt, 0);
        assert_eq!(transport.attempts().len(), 3);

        channel.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent_while_open_or_connecting() {
        let (transport, mut peers) = FakeTransport::new();
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();

        channel.connect();
        channel.connect();
        let _peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;
        channel.connect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.attempts().len(), 1);
        assert!(peers.try_recv().is_err());
        channel.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_while_retrying_cancels_the_timer() {
        let (transport, _peers) = FakeTransport::new();
        transport.set_fallback(Outcome::Refuse);
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();

        wait_for_state(&mut status, ConnectionState::Retrying).await;
        channel.teardown().await;
        assert_eq!(channel.state(), ConnectionState::Closed);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(channel.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_while_connecting_abandons_the_attempt() {
        let (transport, _peers) = FakeTransport::new();
        transport.set_fallback(Outcome::Hang);
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);

        while transport.attempts().is_empty() {
            tokio::task::yield_now().await;
        }
        channel.teardown().await;
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_closes_the_socket_without_reconnecting() {
        let (transport, mut peers) = FakeTransport::new();
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();

        let peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;

        channel.teardown().await;
        peer.closed().await;
        assert_eq!(channel.state(), ConnectionState::Closed);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_during_teardown_parks_the_worker() {
        let (transport, mut peers) = FakeTransport::new();
        let (sink, _) = broadcast::channel(16);
        let machine = ChannelStateMachine::new(RetryPolicy::default());
        let (status_tx, mut status) = watch::channel(machine.status());
        let (_commands, command_rx) = mpsc::unbounded_channel();
        let unmounted = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let worker = Worker {
            transport: transport.clone(),
            url: url(),
            machine,
            commands: command_rx,
            status: status_tx,
            unmounted: Arc::clone(&unmounted),
            shutdown: shutdown.clone(),
            sink,
        };
        let task = tokio::spawn(worker.run());

        let peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;

        // Teardown has raised the flag but not yet cancelled when the peer
        // goes away.
        unmounted.store(true, Ordering::SeqCst);
        drop(peer);

        wait_for_state(&mut status, ConnectionState::Closed).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(status.borrow().state, ConnectionState::Closed);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_dropped_unless_open() {
        let (transport, mut peers) = FakeTransport::new();
        transport.script([Outcome::Hang]);
        let (sink, _) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);

        let ping = ChannelMessage::new("ping");
        assert!(!channel.send(&ping));
        assert_eq!(channel.state(), ConnectionState::Connecting);
        channel.teardown().await;
        assert!(peers.try_recv().is_err());

        let (transport, mut peers) = FakeTransport::new();
        let (sink, _) = broadcast::channel(16);
        let channel = ReconnectingChannel::spawn(transport, url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();
        let mut peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;

        assert!(channel.send(&ping));
        assert_eq!(peer.recv().await.as_deref(), Some(r#"{"type":"ping"}"#));
        channel.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payloads_are_dropped_without_state_change() {
        let (transport, mut peers) = FakeTransport::new();
        let (sink, mut messages) = broadcast::channel(16);
        let channel =
            ReconnectingChannel::spawn(transport.clone(), url(), RetryPolicy::default(), sink);
        let mut status = channel.watch_status();

        let peer = peers.recv().await.unwrap();
        wait_for_state(&mut status, ConnectionState::Open).await;

        peer.send("{not json");
        peer.send(r#"{"message":"no type"}"#);
        peer.send(r#"{"type":"progress","message":"loading model","percent":10}"#);

        let message = messages.recv().await.unwrap();
        assert_eq!(message.kind(), "progress");
        assert_eq!(message.str_field("message"), Some("loading model"));
        assert_eq!(channel.state(), ConnectionState::Open);
        assert_eq!(transport.attempts().len(), 1);

        channel.teardown().await;
    }
}
