//! Application configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::ExportFormat;
use crate::error::{PublishError, Result};

/// Container forced onto tracks after the effects overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTrackFormat {
    /// Keep the track's own extension
    #[default]
    Same,
    Mp3,
    Wav,
    Aac,
}

impl OutputTrackFormat {
    /// Parse a config value. Unknown values fall back to `Same`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "same" => OutputTrackFormat::Same,
            "mp3" => OutputTrackFormat::Mp3,
            "wav" => OutputTrackFormat::Wav,
            "aac" => OutputTrackFormat::Aac,
            other => {
                tracing::warn!(
                    "Unknown output track format '{}', keeping the original extension",
                    other
                );
                OutputTrackFormat::Same
            }
        }
    }

    /// Resolve the export container for a track currently stored with `extension`.
    ///
    /// Returns `None` only for `Same` with an extension that has no known container.
    pub fn resolve(self, extension: &str) -> Option<ExportFormat> {
        match self {
            OutputTrackFormat::Same => ExportFormat::from_extension(extension),
            OutputTrackFormat::Mp3 => Some(ExportFormat::Mp3),
            OutputTrackFormat::Wav => Some(ExportFormat::Wav),
            OutputTrackFormat::Aac => Some(ExportFormat::Adts),
        }
    }
}

/// Track pipeline switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overlay the sound effects bed onto every track
    pub merge_effects: bool,

    /// Mux the prepared tracks into the input video
    pub embed_in_video: bool,

    /// Keep the merged tracks in the merged effects directory.
    /// Only meaningful together with `merge_effects`.
    pub save_merged_tracks: bool,

    /// Container for merged tracks
    pub output_track_format: OutputTrackFormat,

    /// Language tag for the video's own audio stream
    pub default_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_effects: false,
            embed_in_video: true,
            save_merged_tracks: true,
            output_track_format: OutputTrackFormat::Mp3,
            default_language: "eng".to_string(),
        }
    }
}

/// Workspace paths, relative to the project root unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub tracks_dir: PathBuf,
    pub effects_file: PathBuf,
    pub output_video: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tracks_dir: PathBuf::from("tracks"),
            effects_file: PathBuf::from("effect.wav"),
            output_video: PathBuf::from("output.mp4"),
        }
    }
}

/// Metadata attached to the uploaded video
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// YouTube category id
    pub category: String,
    pub for_kids: bool,
}

/// Upload client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub privacy_status: String,
    pub max_retries: u32,
    pub token_uri: String,
    pub upload_uri: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            privacy_status: "private".to_string(),
            max_retries: 10,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            upload_uri: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub paths: PathsConfig,
    pub video: VideoMetadata,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

pub const VALID_PRIVACY_STATUSES: [&str; 3] = ["public", "private", "unlisted"];

impl AppConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if !VALID_PRIVACY_STATUSES.contains(&self.upload.privacy_status.as_str()) {
            return Err(PublishError::Config(format!(
                "privacy_status must be one of {:?}, got '{}'",
                VALID_PRIVACY_STATUSES, self.upload.privacy_status
            )));
        }
        if self.pipeline.default_language.trim().is_empty() {
            return Err(PublishError::Config(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Upload is possible only with OAuth client credentials and a refresh token
    pub fn upload_ready(&self) -> bool {
        self.upload.enabled
            && !self.upload.client_id.is_empty()
            && !self.upload.client_secret.is_empty()
            && !self.upload.refresh_token.is_empty()
    }
}

/// Resolve a configured path against the project root
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
