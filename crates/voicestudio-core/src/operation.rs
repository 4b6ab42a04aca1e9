//! Operation classes and the deadline each one gets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long an outgoing operation may run before it is abandoned.
///
/// Every call site picks exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    /// Status, list, delete and other fast calls.
    Default,
    /// Engine install and runtime repair.
    Long,
    /// Voice generation. Guarded by disconnect-cancels instead of a clock.
    Unbounded,
}

/// Deadline table keyed by [`OperationClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    default: Duration,
    long: Duration,
}

impl TimeoutPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const LONG_TIMEOUT: Duration = Duration::from_secs(600);

    pub const fn new() -> Self {
        Self {
            default: Self::DEFAULT_TIMEOUT,
            long: Self::LONG_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_default(mut self, timeout: Duration) -> Self {
        self.default = timeout;
        self
    }

    #[must_use]
    pub const fn with_long(mut self, timeout: Duration) -> Self {
        self.long = timeout;
        self
    }

    /// The deadline for `class`, or `None` when it may run indefinitely.
    pub const fn deadline(&self, class: OperationClass) -> Option<Duration> {
        match class {
            OperationClass::Default => Some(self.default),
            OperationClass::Long => Some(self.long),
            OperationClass::Unbounded => None,
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new()
    }
}
