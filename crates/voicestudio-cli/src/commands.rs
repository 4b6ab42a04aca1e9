//! Subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use voicestudio_axum::DEFAULT_PORT;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the voicestudio server
    Serve(ServeArgs),

    /// Print every message on the progress channel until Ctrl+C
    Watch {
        /// Only show messages of this type (e.g. progress, install_progress)
        #[arg(long = "type")]
        kind: Option<String>,
    },

    /// Generate a voice preview from a description
    Preview {
        /// Natural-language description of the voice
        description: String,
        /// Text the preview speaks
        #[arg(long)]
        sample_text: Option<String>,
        /// Voice design model id (see `parler-status`)
        #[arg(short, long)]
        model: Option<String>,
        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Install a TTS engine on the server
    Install {
        /// Engine name: kokoro, fish-speech, f5-tts or parler-tts
        engine: String,
    },

    /// Reinstall PyTorch with CUDA support on the server
    FixCuda,

    /// Check that the server is up
    Health,

    /// Show GPU telemetry
    Gpu,

    /// Show whether voice design is available, and its models
    ParlerStatus,
}

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "VOICESTUDIO_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Data directory (previews, voices, logs). Defaults to the platform data dir.
    #[arg(long, env = "VOICESTUDIO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Python interpreter for pip and the design helper
    #[arg(long, env = "VOICESTUDIO_PYTHON")]
    pub python: Option<PathBuf>,

    /// Custom voice design helper command, e.g. "python3 my_helper.py"
    #[arg(long, env = "VOICESTUDIO_DESIGN_CMD")]
    pub design_cmd: Option<String>,

    /// Accept requests from any origin
    #[arg(long)]
    pub cors_allow_all: bool,

    /// Seconds between "still generating" progress messages
    #[arg(long, default_value_t = 5)]
    pub heartbeat_secs: u64,
}
