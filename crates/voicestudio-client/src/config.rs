//! Public configuration for the voicestudio client.

use std::time::Duration;

use url::Url;
use voicestudio_core::{RetryPolicy, TimeoutPolicy};

/// Configuration for [`VoiceStudioClient`](crate::VoiceStudioClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use voicestudio_client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_base_url("https://studio.local:8765")
///     .with_default_timeout(Duration::from_secs(5));
/// assert_eq!(
///     config.channel_url().unwrap().as_str(),
///     "wss://studio.local:8765/api/ws/progress"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) api_prefix: String,
    pub(crate) channel_path: String,
    pub(crate) timeouts: TimeoutPolicy,
    pub(crate) retry: RetryPolicy,
    pub(crate) broadcast_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8765".to_string(),
            api_prefix: "/api".to_string(),
            channel_path: "/api/ws/progress".to_string(),
            timeouts: TimeoutPolicy::default(),
            retry: RetryPolicy::default(),
            broadcast_capacity: 256,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server origin. Defaults to `http://127.0.0.1:8765`.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Path prefix for operation calls. Defaults to `/api`.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Path of the event channel endpoint. Defaults to `/api/ws/progress`.
    #[must_use]
    pub fn with_channel_path(mut self, path: impl Into<String>) -> Self {
        self.channel_path = path.into();
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Deadline for Default-class operations. Defaults to 15 seconds.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.with_default(timeout);
        self
    }

    /// Deadline for Long-class operations. Defaults to 600 seconds.
    #[must_use]
    pub const fn with_long_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.with_long(timeout);
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Messages buffered per subscriber before the slowest one starts
    /// skipping. Defaults to 256.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    pub const fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    /// `api_prefix` joined with `path`.
    pub(crate) fn api_path(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix.trim_end_matches('/'), path)
    }

    /// Event channel URL. The scheme follows the base URL: `https` origins
    /// get `wss`, everything else `ws`.
    pub fn channel_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.base_url()?.join(&self.channel_path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) is always an allowed scheme change.
        let _ = url.set_scheme(scheme);
        Ok(url)
    }
}
