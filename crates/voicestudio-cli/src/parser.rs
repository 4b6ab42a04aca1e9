//! Main CLI parser and top-level argument handling.

use clap::Parser;
use voicestudio_client::ClientConfig;

use crate::commands::Commands;

/// Command-line interface for the voicestudio server and its progress channel.
#[derive(Parser)]
#[command(name = "voicestudio")]
#[command(about = "Run and drive a local voice design studio")]
#[command(version)]
pub struct Cli {
    /// Server origin used by client commands
    #[arg(
        long,
        env = "VOICESTUDIO_URL",
        default_value = "http://127.0.0.1:8765",
        global = true
    )]
    pub url: String,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Client configuration for commands that talk to a running server.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new().with_base_url(self.url.trim_end_matches('/'))
    }
}
