//! Connection state for the reconnecting progress channel.
//!
//! This module is pure: it decides *what* should happen on each connection
//! event (open, close, retry timer elapsed, teardown) and leaves the *doing*
//! (sockets, timers) to the client actor that owns it. Keeping the decisions
//! here makes every transition testable without a network or a clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection state of the single shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is usable for send and receive.
    Open,
    /// Waiting for the backoff timer before the next attempt.
    Retrying,
    /// Terminal for this session. Nothing further is scheduled.
    Closed,
}

impl ConnectionState {
    /// Whether messages can be sent right now.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Retrying => "retrying",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
}

impl RetryPolicy {
    /// Default first-retry delay.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
    /// Default delay cap.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
    /// Default number of consecutive retries before giving up.
    pub const DEFAULT_MAX_RETRIES: u32 = 10;

    pub const fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `min(base * 2^attempt, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let multiplier = 1_u32 << shift;
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_BASE_DELAY,
            Self::DEFAULT_MAX_DELAY,
            Self::DEFAULT_MAX_RETRIES,
        )
    }
}

/// Retry bookkeeping: how many consecutive retries have been scheduled and
/// the delay used for the most recent one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_delay: Option<Duration>,
}

/// Snapshot published to observers of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    pub retry: RetryState,
}

/// Outcome of a close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Schedule exactly one reconnect after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retries are exhausted; the channel is now `Closed`.
    GiveUp,
    /// The close was expected (teardown) or stale; do nothing.
    Ignored,
}

/// The reconnecting channel's state machine.
///
/// Starts in `Connecting`. Only the channel actor mutates it.
#[derive(Debug, Clone)]
pub struct ChannelStateMachine {
    policy: RetryPolicy,
    state: ConnectionState,
    retry: RetryState,
    torn_down: bool,
}

impl ChannelStateMachine {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Connecting,
            retry: RetryState {
                attempt: 0,
                last_delay: None,
            },
            torn_down: false,
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    pub const fn retry(&self) -> RetryState {
        self.retry
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub const fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            retry: self.retry,
        }
    }

    /// An explicit `connect()` request.
    ///
    /// Returns `true` when a new connection attempt should start. Idempotent
    /// while `Connecting` or `Open`; a pending retry timer is left alone so
    /// there is never more than one attempt outstanding. From `Closed` a
    /// fresh session starts with the attempt counter reset.
    pub fn request_connect(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Retrying => {
                false
            }
            ConnectionState::Closed => {
                self.retry = RetryState::default();
                self.state = ConnectionState::Connecting;
                true
            }
        }
    }

    /// The in-flight attempt succeeded.
    ///
    /// Returns `false` if the open arrived after teardown, in which case the
    /// caller must close the socket it just got.
    pub fn on_open(&mut self) -> bool {
        if self.torn_down || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.retry = RetryState::default();
        true
    }

    /// The connection closed or the attempt failed.
    pub fn on_close(&mut self) -> Transition {
        if self.torn_down {
            return Transition::Ignored;
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {}
            ConnectionState::Retrying | ConnectionState::Closed => return Transition::Ignored,
        }

        if self.retry.attempt >= self.policy.max_retries {
            self.state = ConnectionState::Closed;
            return Transition::GiveUp;
        }

        let delay = self.policy.delay_for_attempt(self.retry.attempt);
        self.retry.attempt += 1;
        self.retry.last_delay = Some(delay);
        self.state = ConnectionState::Retrying;
        Transition::Retry {
            attempt: self.retry.attempt,
            delay,
        }
    }

    /// The backoff timer fired. Returns `true` when an attempt should start.
    pub fn on_retry_elapsed(&mut self) -> bool {
        if self.torn_down || self.state != ConnectionState::Retrying {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Deliberate shutdown. Every later event is ignored.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.state = ConnectionState::Closed;
    }
}

impl Default for ChannelStateMachine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
