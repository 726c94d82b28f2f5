use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use reelwire::{FrameFormat, Reelwire, StreamConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reelwire", version, about = "Mock text-to-video streaming server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8010")]
    bind: SocketAddr,

    /// YAML configuration file. Missing keys use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the simulated per-block latency.
    #[arg(long)]
    block_latency_ms: Option<u64>,

    /// Override the number of frames per session.
    #[arg(long)]
    total_frames: Option<u64>,

    /// Override the frame encoding.
    #[arg(long, value_enum)]
    format: Option<FormatChoice>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Jpeg,
    Png,
}

impl From<FormatChoice> for FrameFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Jpeg => FrameFormat::Jpeg,
            FormatChoice::Png => FrameFormat::Png,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StreamConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    if let Some(latency) = cli.block_latency_ms {
        config.block_latency_ms = latency;
    }
    if let Some(total_frames) = cli.total_frames {
        config.total_frames = total_frames;
    }
    if let Some(format) = cli.format {
        config.output_format = format.into();
    }
    config.validate().context("validate config")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        "{} frames of {}x{} {} in blocks of {} ({} ms/block)",
        config.total_frames,
        config.frame_width,
        config.frame_height,
        config.output_format,
        config.frames_per_block,
        config.block_latency_ms
    );

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
    };

    Reelwire::serve(cli.bind, config, shutdown).await.context("serve")?;
    Ok(())
}
