//! Command handlers.
//!
//! Each handler owns one subcommand. Client commands share a single
//! [`VoiceStudioClient`](voicestudio_client::VoiceStudioClient) and shut it
//! down before returning.

pub mod install;
pub mod preview;
pub mod serve;
pub mod status;
pub mod watch;
