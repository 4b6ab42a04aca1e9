#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tower as _;
#[cfg(test)]
use voicestudio_client as _;

pub mod bootstrap;
pub mod bridge;
pub mod broadcaster;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export primary types
pub use bootstrap::{
    AxumContext, CorsConfig, DEFAULT_PORT, ServerConfig, bootstrap, serve, start_server,
};
pub use broadcaster::{ConnectionGuard, ProgressBroadcaster};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
