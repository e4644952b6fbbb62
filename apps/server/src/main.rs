use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use humscribe_service::{
    router, spawn_sweeper, AppState, NormalizerKind, ServiceConfig, Storage, TranscriberKind,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve audio-to-MIDI transcription over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(long)]
    upload_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// auto, symphonia or ffmpeg
    #[arg(long)]
    normalizer: Option<NormalizerKind>,
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
    /// onnx or command
    #[arg(long)]
    transcriber: Option<TranscriberKind>,
    /// basic-pitch ONNX model
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// basic-pitch executable used by the command transcriber
    #[arg(long)]
    basic_pitch: Option<PathBuf>,
    /// Delete uploads and outputs older than this, e.g. `7d` or `12h`
    #[arg(long, value_parser = humantime::parse_duration)]
    retention: Option<Duration>,
    #[arg(long)]
    max_upload_bytes: Option<usize>,
    /// Answer unknown downloads with 404 instead of 200
    #[arg(long)]
    strict_download_status: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.upload_dir {
            config.upload_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(kind) = self.normalizer {
            config.normalizer.backend = kind;
        }
        if let Some(path) = self.ffmpeg {
            config.normalizer.ffmpeg = path;
        }
        if let Some(kind) = self.transcriber {
            config.transcriber.backend = kind;
        }
        if let Some(path) = self.model {
            config.transcriber.model = path;
        }
        if let Some(path) = self.basic_pitch {
            config.transcriber.basic_pitch = path;
        }
        if self.retention.is_some() {
            config.retention.max_age = self.retention;
        }
        if self.max_upload_bytes.is_some() {
            config.max_upload_bytes = self.max_upload_bytes;
        }
        config.strict_download_status |= self.strict_download_status;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    Storage::from_config(&config)
        .ensure_dirs()
        .context("create upload and output directories")?;
    let state = AppState::from_config(&config).context("initialise transcription backends")?;

    if let Some(max_age) = config.retention.max_age {
        spawn_sweeper(
            vec![config.upload_dir.clone(), config.output_dir.clone()],
            max_age,
        );
    }

    let app = router::build(state, &config);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
