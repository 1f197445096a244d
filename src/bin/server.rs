#![forbid(unsafe_code)]

//! Loopback HTTP server the browser extension talks to.
//!
//! Requests are handled one at a time per connection and block on `yt-dlp`
//! until it finishes; there is no job queue.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use shorts_grabber::{
    api::{AppState, router},
    config::{ConfigOverrides, ServerConfig, resolve_server_config},
    extractor::YtDlp,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "shorts_grabber=info,grabber_server=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(
    name = "grabber_server",
    about = "Local download server for the TikTok & YouTube Shorts extension"
)]
struct ServerArgs {
    /// Loopback address to listen on (GRABBER_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (GRABBER_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Where downloads are written (GRABBER_DOWNLOAD_DIR).
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// yt-dlp executable (GRABBER_YTDLP).
    #[arg(long = "yt-dlp", value_name = "PATH")]
    ytdlp: Option<PathBuf>,
    /// Optional `.env` file with the variables above.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ServerArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            download_dir: self.download_dir,
            host: self.host,
            port: self.port,
            ytdlp_program: self.ytdlp,
            env_path: self.env_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = ServerArgs::parse();
    let config = resolve_server_config(args.into_overrides())?;
    config.prepare_download_dir()?;

    let engine = YtDlp::new(config.ytdlp_program.clone());
    check_engine(&engine);

    serve(config, engine).await
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The server still starts without yt-dlp so `/health` answers and the
/// extension can report a useful error.
fn check_engine(engine: &YtDlp) {
    match engine.version() {
        Ok(version) => info!(
            program = %engine.program().display(),
            %version,
            "extractor available"
        ),
        Err(err) => warn!(
            program = %engine.program().display(),
            error = %err,
            "extractor unavailable; downloads will fail until it is installed"
        ),
    }
}

async fn serve(config: ServerConfig, engine: YtDlp) -> Result<()> {
    let addr = config.socket_addr();
    info!(download_dir = %config.download_dir.display(), "downloads will be saved here");

    let app = router(AppState::new(config, Arc::new(engine)));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still ends the process.
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}
