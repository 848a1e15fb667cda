//! Configuration file support
//!
//! Loads the application configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    AppConfig, LoggingConfig, OutputTrackFormat, PathsConfig, PipelineConfig, UploadConfig,
    VideoMetadata,
};
use crate::error::{PublishError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Pipeline switches
    pub pipeline: Option<PipelineSettings>,
    /// Workspace paths
    pub paths: Option<PathSettings>,
    /// Video metadata for the upload
    pub video: Option<VideoSettings>,
    /// Upload client settings
    pub upload: Option<UploadSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub merge_effects: Option<bool>,
    pub embed_in_video: Option<bool>,
    pub save_merged_tracks: Option<bool>,
    /// same, mp3, wav or aac
    pub output_track_format: Option<String>,
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    pub tracks_dir: Option<String>,
    pub effects_file: Option<String>,
    pub output_video: Option<String>,
}

/// Tags may be written as a list or as one comma-separated string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Csv(String),
}

impl TagList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            TagList::List(tags) => tags,
            TagList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoSettings {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<TagList>,
    pub category: Option<String>,
    pub for_kids: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSettings {
    pub enabled: Option<bool>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub privacy_status: Option<String>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PublishError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PublishError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            pipeline: Some(PipelineSettings {
                merge_effects: Some(false),
                embed_in_video: Some(true),
                save_merged_tracks: Some(true),
                output_track_format: Some("mp3".to_string()),
                default_language: Some("eng".to_string()),
            }),
            paths: Some(PathSettings {
                tracks_dir: Some("tracks".to_string()),
                effects_file: Some("effect.wav".to_string()),
                output_video: Some("output.mp4".to_string()),
            }),
            video: Some(VideoSettings {
                title: Some("My video".to_string()),
                description: Some(String::new()),
                tags: Some(TagList::List(Vec::new())),
                category: Some("22".to_string()),
                for_kids: Some(false),
            }),
            upload: Some(UploadSettings {
                enabled: Some(true),
                client_id: Some(String::new()),
                client_secret: Some(String::new()),
                refresh_token: Some(String::new()),
                privacy_status: Some("private".to_string()),
                max_retries: Some(10),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to AppConfig
    pub fn into_app_config(self) -> AppConfig {
        let pipeline_defaults = PipelineConfig::default();
        let pipeline = match self.pipeline {
            Some(p) => PipelineConfig {
                merge_effects: p.merge_effects.unwrap_or(pipeline_defaults.merge_effects),
                embed_in_video: p.embed_in_video.unwrap_or(pipeline_defaults.embed_in_video),
                save_merged_tracks: p
                    .save_merged_tracks
                    .unwrap_or(pipeline_defaults.save_merged_tracks),
                output_track_format: p
                    .output_track_format
                    .as_deref()
                    .map(OutputTrackFormat::parse_lenient)
                    .unwrap_or(pipeline_defaults.output_track_format),
                default_language: p
                    .default_language
                    .unwrap_or(pipeline_defaults.default_language),
            },
            None => pipeline_defaults,
        };

        let path_defaults = PathsConfig::default();
        let paths = match self.paths {
            Some(p) => PathsConfig {
                tracks_dir: p.tracks_dir.map(Into::into).unwrap_or(path_defaults.tracks_dir),
                effects_file: p
                    .effects_file
                    .map(Into::into)
                    .unwrap_or(path_defaults.effects_file),
                output_video: p
                    .output_video
                    .map(Into::into)
                    .unwrap_or(path_defaults.output_video),
            },
            None => path_defaults,
        };

        let video = self
            .video
            .map(|v| VideoMetadata {
                title: v.title.unwrap_or_default(),
                description: v.description.unwrap_or_default(),
                tags: v.tags.map(TagList::into_vec).unwrap_or_default(),
                category: v.category.unwrap_or_default(),
                for_kids: v.for_kids.unwrap_or(false),
            })
            .unwrap_or_default();

        let upload_defaults = UploadConfig::default();
        let upload = match self.upload {
            Some(u) => UploadConfig {
                enabled: u.enabled.unwrap_or(upload_defaults.enabled),
                client_id: u.client_id.unwrap_or_default(),
                client_secret: u.client_secret.unwrap_or_default(),
                refresh_token: u.refresh_token.unwrap_or_default(),
                privacy_status: u
                    .privacy_status
                    .unwrap_or(upload_defaults.privacy_status.clone()),
                max_retries: u.max_retries.unwrap_or(upload_defaults.max_retries),
                ..upload_defaults
            },
            None => upload_defaults,
        };

        let logging = self
            .logging
            .map(|l| LoggingConfig {
                level: l.level,
                format: l.format.unwrap_or_else(|| "pretty".to_string()),
            })
            .unwrap_or_default();

        AppConfig {
            pipeline,
            paths,
            video,
            upload,
            logging,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}

/// Load the configuration at `path`, falling back to defaults when it does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(AppConfig::default());
    }
    let config = ConfigFile::from_file(path)?.into_app_config();
    config.validate()?;
    Ok(config)
}
