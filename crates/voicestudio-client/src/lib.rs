#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by integration tests.
#[cfg(test)]
use axum as _;

pub mod api;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod hub;
pub mod install;
pub mod transport;

pub use api::{ApiClient, OperationRequest, RequestBody};
pub use channel::ReconnectingChannel;
pub use client::VoiceStudioClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, TransportError};
pub use generation::{GenerationHandle, GenerationProgress};
pub use hub::{CallbackSubscription, ProgressHub, Subscription};
pub use install::InstallWatcher;
pub use transport::{Transport, TransportConnection, WsTransport};

pub use tokio_util::sync::CancellationToken;

// Re-export the domain types callers need alongside the client.
pub use voicestudio_core::{
    ChannelMessage, ChannelStatus, ConnectionState, InstallProgress, InstallStage, OperationClass,
    PreviewRequest, PreviewResult, ProgressUpdate, RetryPolicy, TimeoutPolicy,
};
