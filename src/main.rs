//! dubmux
//!
//! Prepares per-language audio tracks for a video (stereo conversion and an
//! optional sound effects bed), muxes them into the video with language
//! metadata and uploads the result to YouTube.

#![allow(dead_code)]

mod audio;
mod config;
mod config_file;
mod discovery;
mod error;
mod ffmpeg;
mod language;
mod mux;
mod pipeline;
#[cfg(test)]
mod testing;
mod tracks;
mod transcode;
mod upload;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{resolve_path, LoggingConfig};
use crate::error::{PublishError, Result};
use crate::mux::FfmpegMuxer;
use crate::pipeline::{AutoSkip, Pipeline, StdinPrompt, WorkspaceLayout};
use crate::transcode::FfmpegCodec;
use crate::upload::YouTubeUploader;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "dubmux";

#[derive(Parser, Debug)]
#[command(name = "dubmux", version, about = "Embed dubbed audio tracks into a video and publish it")]
struct Args {
    /// Project directory holding the input video, tracks/ and effect.wav
    #[arg(long)]
    root: Option<PathBuf>,

    /// Configuration file, relative to the project directory
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip tracks with unrecognized language codes instead of asking
    #[arg(long)]
    skip_invalid: bool,

    /// Do not upload the output video
    #[arg(long)]
    no_upload: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let config_path = resolve_path(&root, &args.config);

    if args.init_config {
        init_logging(&LoggingConfig::default());
        config_file::generate_default_config(&config_path)?;
        tracing::info!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = config_file::load_or_default(&config_path);
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    let config = config.map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;
    tracing::debug!("Configuration loaded: {:?}", config);

    ffmpeg::init()?;
    ffmpeg::quiet_logging();
    tracing::info!("FFmpeg version: {}", ffmpeg::version_info());

    let pipeline_config = config.pipeline.clone();
    let layout = WorkspaceLayout::new(&root, &config.paths);
    let skip_invalid = args.skip_invalid;

    let outcome = tokio::task::spawn_blocking(move || {
        let codec = FfmpegCodec::new();
        let muxer = FfmpegMuxer::new();
        let pipeline = Pipeline::new(&pipeline_config, layout, &codec, &muxer);
        if skip_invalid {
            pipeline.run(&mut AutoSkip)
        } else {
            pipeline.run(&mut StdinPrompt)
        }
    })
    .await
    .map_err(|e| PublishError::Task(e.to_string()))?
    .map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    for track in &outcome.prepared.tracks {
        tracing::info!(
            code = %track.code,
            name = %track.display_name,
            "Prepared {}",
            track.path.display()
        );
    }

    let Some(video) = outcome.output_video else {
        tracing::info!("Done!");
        return Ok(());
    };

    if args.no_upload {
        tracing::info!("Upload disabled, output video is {}", video.display());
    } else if !config.upload_ready() {
        tracing::warn!(
            "Upload credentials missing from {}, skipping upload",
            config_path.display()
        );
    } else {
        let uploader = YouTubeUploader::new(config.upload.clone())?;
        uploader.upload(&video, &config.video).await?;
    }

    tracing::info!("Done!");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}={}", APP_NAME, logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
