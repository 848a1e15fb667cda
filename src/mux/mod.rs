//! Embedding prepared tracks into the video
//!
//! Muxing is delegated to the `ffmpeg` executable. The arguments are built
//! by [`FfmpegArgsBuilder`] and passed straight to the process, never
//! through a shell.

pub mod options_builder;

pub use options_builder::FfmpegArgsBuilder;

use std::path::PathBuf;
use std::process::Command;

use crate::error::{PublishError, Result};
use crate::tracks::PreparedTracks;

/// Everything needed to produce the output video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxPlan {
    pub input_video: PathBuf,
    pub output_video: PathBuf,
    pub tracks: PreparedTracks,
}

impl MuxPlan {
    pub fn new(input_video: PathBuf, output_video: PathBuf, tracks: PreparedTracks) -> Self {
        Self {
            input_video,
            output_video,
            tracks,
        }
    }
}

/// Writes the output video for a plan
pub trait VideoMuxer {
    fn mux(&self, plan: &MuxPlan) -> Result<()>;
}

/// Runs the `ffmpeg` command line tool
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: String,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoMuxer for FfmpegMuxer {
    fn mux(&self, plan: &MuxPlan) -> Result<()> {
        let args = FfmpegArgsBuilder::new(plan).build();
        tracing::info!(
            tracks = plan.tracks.len(),
            output = %plan.output_video.display(),
            "Adding audio tracks to video"
        );
        tracing::debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| PublishError::Mux(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::Mux(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_mux_error() {
        let plan = MuxPlan::new(
            PathBuf::from("input.mp4"),
            PathBuf::from("output.mp4"),
            PreparedTracks::default(),
        );
        let result = FfmpegMuxer::with_binary("/nonexistent/ffmpeg").mux(&plan);
        assert!(matches!(result, Err(PublishError::Mux(_))));
    }
}
