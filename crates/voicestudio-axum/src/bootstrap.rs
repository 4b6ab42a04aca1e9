//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the runtime adapters are wired to
//! the ports the handlers use.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use voicestudio_core::{GpuProbePort, PackageInstallerPort, VoiceDesignPort};
use voicestudio_runtime::{NvidiaSmiProbe, PipInstaller, ProcessVoiceDesigner, find_python};

use crate::broadcaster::ProgressBroadcaster;

/// Origins a local frontend dev server or the bundled UI is served from.
pub const DEV_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:8765",
    "http://127.0.0.1:8765",
];

pub const DEFAULT_PORT: u16 = 8765;

/// CORS configuration for the web server.
#[derive(Debug, Clone)]
pub enum CorsConfig {
    /// Allow all origins.
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::AllowOrigins(DEV_ORIGINS.iter().map(ToString::to_string).collect())
    }
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Generated previews, one subdirectory per day.
    pub previews_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub cors: CorsConfig,
    /// Interpreter used for pip and the bundled design helper. Looked up on
    /// `PATH` when unset.
    pub python: Option<PathBuf>,
    /// Program and leading arguments of a custom design helper. The bundled
    /// Parler-TTS helper is used when unset.
    pub voice_design_command: Option<Vec<String>>,
    /// How often a running generation reports that it is still alive.
    pub heartbeat_interval: Duration,
}

impl ServerConfig {
    /// Config rooted at `data_dir`, with the derived directories below it.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            previews_dir: data_dir.join("previews"),
            voices_dir: data_dir.join("voices"),
            logs_dir: data_dir.join("logs"),
            data_dir,
            cors: CorsConfig::default(),
            python: None,
            voice_design_command: None,
            heartbeat_interval: Duration::from_secs(5),
        }
    }

    /// Config rooted at the platform data directory.
    pub fn with_defaults() -> Result<Self> {
        let base = dirs::data_dir().context("Cannot determine the platform data directory")?;
        Ok(Self::new(base.join("voicestudio")))
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    #[must_use]
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = Some(python.into());
        self
    }

    #[must_use]
    pub fn with_design_command(mut self, command: Vec<String>) -> Self {
        self.voice_design_command = Some(command);
        self
    }

    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Create every directory the server writes to.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.data_dir,
            &self.previews_dir,
            &self.voices_dir,
            &self.logs_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    fn helpers_dir(&self) -> PathBuf {
        self.data_dir.join("helpers")
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    pub config: ServerConfig,
    /// Fans progress out to every event-channel socket.
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub designer: Arc<dyn VoiceDesignPort>,
    pub installer: Arc<dyn PackageInstallerPort>,
    pub gpu: Arc<dyn GpuProbePort>,
}

impl AxumContext {
    /// Context over caller-supplied adapters.
    pub fn new(
        config: ServerConfig,
        designer: Arc<dyn VoiceDesignPort>,
        installer: Arc<dyn PackageInstallerPort>,
        gpu: Arc<dyn GpuProbePort>,
    ) -> Self {
        Self {
            config,
            broadcaster: Arc::new(ProgressBroadcaster::with_defaults()),
            designer,
            installer,
            gpu,
        }
    }
}

/// Bootstrap the server with the OS-backed adapters.
pub fn bootstrap(config: ServerConfig) -> Result<AxumContext> {
    config.ensure_directories()?;

    let python = match &config.python {
        Some(python) => python.clone(),
        None => find_python()?,
    };

    let designer: Arc<dyn VoiceDesignPort> = match config.voice_design_command.as_deref() {
        Some([program, args @ ..]) => Arc::new(ProcessVoiceDesigner::new(program, args.to_vec())),
        _ => Arc::new(
            ProcessVoiceDesigner::bundled(&python, &config.helpers_dir())
                .context("Failed to deploy the voice design helper")?,
        ),
    };

    info!(
        data_dir = %config.data_dir.display(),
        previews_dir = %config.previews_dir.display(),
        python = %python.display(),
        "Axum bootstrap resolved paths"
    );

    Ok(AxumContext::new(
        config,
        designer,
        Arc::new(PipInstaller::new(python)),
        Arc::new(NvidiaSmiProbe::new()),
    ))
}

/// Bootstrap and serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let ctx = bootstrap(config)?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("voicestudio server listening on http://{}", listener.local_addr()?);

    serve(listener, ctx, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await
}

/// Serve `ctx` on `listener` until `shutdown` resolves.
///
/// Open event-channel sockets are closed as soon as shutdown begins.
pub async fn serve(
    listener: TcpListener,
    ctx: AxumContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let closing = ctx.broadcaster.shutdown_token();
    let cors = ctx.config.cors.clone();
    let app = crate::routes::create_router(ctx, &cors);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            closing.cancel();
        })
        .await?;
    Ok(())
}
