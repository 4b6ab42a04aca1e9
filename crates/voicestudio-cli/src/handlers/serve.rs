//! `serve` - run the axum server in the foreground.

use std::time::Duration;

use anyhow::{Result, bail};
use voicestudio_axum::{CorsConfig, ServerConfig, start_server};

use crate::commands::ServeArgs;

pub async fn execute(args: ServeArgs) -> Result<()> {
    start_server(server_config(args)?).await
}

/// Translate command-line options into a [`ServerConfig`].
pub fn server_config(args: ServeArgs) -> Result<ServerConfig> {
    let mut config = match args.data_dir {
        Some(dir) => ServerConfig::new(dir),
        None => ServerConfig::with_defaults()?,
    }
    .with_host(args.host)
    .with_port(args.port)
    .with_heartbeat_interval(Duration::from_secs(args.heartbeat_secs.max(1)));

    if let Some(python) = args.python {
        config = config.with_python(python);
    }
    if let Some(command) = args.design_cmd {
        let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if parts.is_empty() {
            bail!("--design-cmd is empty");
        }
        config = config.with_design_command(parts);
    }
    if args.cors_allow_all {
        config = config.with_cors(CorsConfig::AllowAll);
    }
    Ok(config)
}
