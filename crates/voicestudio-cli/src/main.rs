//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use voicestudio_cli::{Cli, Commands, handlers};
use voicestudio_client::VoiceStudioClient;
use voicestudio_core::PreviewRequest;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap reads env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.client_config();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Client commands share one client; it connects lazily.
    let client = VoiceStudioClient::new(config)?;
    let result = match command {
        Commands::Serve(args) => handlers::serve::execute(args).await,
        Commands::Watch { kind } => handlers::watch::execute(&client, kind.as_deref()).await,
        Commands::Preview {
            description,
            sample_text,
            model,
            temperature,
        } => {
            let mut request = PreviewRequest::new(description);
            if let Some(text) = sample_text {
                request = request.with_sample_text(text);
            }
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(temperature) = temperature {
                request = request.with_temperature(temperature);
            }
            handlers::preview::execute(&client, request).await
        }
        Commands::Install { engine } => handlers::install::install(&client, &engine).await,
        Commands::FixCuda => handlers::install::fix_cuda(&client).await,
        Commands::Health => handlers::status::health(&client).await,
        Commands::Gpu => handlers::status::gpu(&client).await,
        Commands::ParlerStatus => handlers::status::parler(&client).await,
    };

    client.shutdown().await;
    result
}
