//! Track preparation pipeline
//!
//! Sequences one run over the workspace:
//!
//! 1. scan the track directory and resolve each file's language
//! 2. normalize every track to stereo
//! 3. optionally mix the sound effects bed into every track
//! 4. hand the `{code: path}` mapping to the muxer
//! 5. delete every temporary file the run created
//!
//! Step 5 runs whether or not the earlier steps succeeded.

pub mod effects;
pub mod interaction;
pub mod ledger;
pub mod naming;
pub mod normalize;

pub use interaction::{AutoSkip, Interaction, StdinPrompt};
pub use ledger::{DrainReport, TempFileLedger};

use std::path::{Path, PathBuf};

use crate::audio::AudioCodec;
use crate::config::{resolve_path, PathsConfig, PipelineConfig};
use crate::discovery::{ensure_tracks_dir, find_input_video, scan_audio_files};
use crate::error::{PublishError, Result};
use crate::language::LanguageResolver;
use crate::mux::{MuxPlan, VideoMuxer};
use crate::tracks::{PreparedTracks, Track, TrackSet};

use effects::EffectsMerger;
use normalize::{ScratchDir, TrackNormalizer};

/// Scratch directory name inside the track directory
pub const SCRATCH_DIR_NAME: &str = "temp";
/// Merged tracks directory name inside the track directory
pub const MERGED_DIR_NAME: &str = "Merged Effects Tracks";

/// Where a run reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub tracks_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub merged_dir: PathBuf,
    pub effects_file: PathBuf,
    pub output_video: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: &Path, paths: &PathsConfig) -> Self {
        let tracks_dir = resolve_path(root, &paths.tracks_dir);
        Self {
            root: root.to_path_buf(),
            scratch_dir: tracks_dir.join(SCRATCH_DIR_NAME),
            merged_dir: tracks_dir.join(MERGED_DIR_NAME),
            effects_file: resolve_path(root, &paths.effects_file),
            output_video: resolve_path(root, &paths.output_video),
            tracks_dir,
        }
    }
}

/// Result of a successful run
#[derive(Debug)]
pub struct RunOutcome {
    pub prepared: PreparedTracks,
    /// Set when the tracks were embedded into a new video
    pub output_video: Option<PathBuf>,
    pub cleanup: DrainReport,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    layout: WorkspaceLayout,
    codec: &'a dyn AudioCodec,
    muxer: &'a dyn VideoMuxer,
    resolver: LanguageResolver,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        layout: WorkspaceLayout,
        codec: &'a dyn AudioCodec,
        muxer: &'a dyn VideoMuxer,
    ) -> Self {
        Self {
            config,
            layout,
            codec,
            muxer,
            resolver: LanguageResolver::new(),
        }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Prepare, mux and clean up.
    pub fn run(&self, interaction: &mut dyn Interaction) -> Result<RunOutcome> {
        let mut ledger = TempFileLedger::new();
        let result = self.run_stages(interaction, &mut ledger);
        if let Err(e) = &result {
            tracing::warn!("Run failed ({}), removing temporary files", e);
        }
        let cleanup = ledger.drain_all();

        let (prepared, output_video) = result?;
        Ok(RunOutcome {
            prepared,
            output_video,
            cleanup,
        })
    }

    fn run_stages(
        &self,
        interaction: &mut dyn Interaction,
        ledger: &mut TempFileLedger,
    ) -> Result<(PreparedTracks, Option<PathBuf>)> {
        let input_video = if self.config.embed_in_video {
            let video = find_input_video(&self.layout.root)?;
            tracing::info!("Input video: {}", video.display());
            Some(video)
        } else {
            None
        };

        let prepared = self.prepare(interaction, ledger)?;

        let output_video = match input_video {
            Some(video) if !prepared.is_empty() => {
                let plan = MuxPlan::new(video, self.layout.output_video.clone(), prepared.clone());
                self.muxer.mux(&plan)?;
                Some(plan.output_video)
            }
            Some(_) => {
                tracing::info!("No audio tracks to embed, skipping the video");
                None
            }
            None => None,
        };
        Ok((prepared, output_video))
    }

    /// Build the final track mapping. Temporary files are registered in
    /// `ledger` and left for the caller to drain.
    pub fn prepare(
        &self,
        interaction: &mut dyn Interaction,
        ledger: &mut TempFileLedger,
    ) -> Result<PreparedTracks> {
        let tracks = self.collect_tracks(interaction)?;
        let mut scratch = ScratchDir::new(&self.layout.scratch_dir);
        let normalizer = TrackNormalizer::new(self.codec);

        tracing::info!(tracks = tracks.len(), "Checking if tracks are stereo");
        let mut normalized = TrackSet::new();
        for track in tracks.into_tracks() {
            normalized.insert(normalizer.normalize(track, &mut scratch, ledger)?)?;
        }

        if self.config.merge_effects {
            if !self.layout.effects_file.is_file() {
                return Err(PublishError::Config(format!(
                    "Sound effects file {} not found",
                    self.layout.effects_file.display()
                )));
            }
            let effects = normalizer.normalize(
                Track::effects(self.layout.effects_file.clone()),
                &mut scratch,
                ledger,
            )?;
            EffectsMerger::new(self.codec, self.config).merge(
                &mut normalized,
                &effects,
                &mut scratch,
                &self.layout.merged_dir,
                ledger,
            )?;
        }

        Ok(PreparedTracks::new(
            normalized,
            self.config.default_language.as_str(),
        ))
    }

    /// Scan the track directory and resolve languages.
    ///
    /// Fails on the first duplicate language, before any audio is read.
    pub fn collect_tracks(&self, interaction: &mut dyn Interaction) -> Result<TrackSet> {
        ensure_tracks_dir(&self.layout.tracks_dir)?;

        let mut set = TrackSet::new();
        for path in scan_audio_files(&self.layout.tracks_dir)? {
            let token = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.resolver.resolve(&token) {
                Ok(language) => {
                    tracing::debug!(file = %path.display(), language = %language, "Found track");
                    set.insert(Track::new(language, token, path))?;
                }
                Err(reason) => {
                    if !interaction.skip_invalid_language(&path, &token, &reason) {
                        return Err(PublishError::InvalidLanguage { token, file: path });
                    }
                }
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputTrackFormat;
    use crate::testing::{write_tone, AlwaysAbort, RecordingMuxer, WavCodec};
    use std::fs;
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        layout: WorkspaceLayout,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let layout = WorkspaceLayout::new(dir.path(), &PathsConfig::default());
            fs::create_dir_all(&layout.tracks_dir).unwrap();
            fs::write(dir.path().join("input.mp4"), b"video").unwrap();
            Self { dir, layout }
        }

        fn track(&self, name: &str, channels: u16, secs: f64) -> PathBuf {
            let path = self.layout.tracks_dir.join(name);
            write_tone(&path, channels, secs);
            path
        }
    }

    #[test]
    fn test_end_to_end_without_effects() {
        let ws = Workspace::new();
        let en = ws.track("en.mp3", 2, 5.0);
        let fr = ws.track("fr.wav", 1, 5.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig::default();

        let outcome = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap();

        let prepared = &outcome.prepared;
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared.path_of("eng"), Some(en.as_path()));
        let fr_path = prepared.path_of("fra").unwrap();
        assert_ne!(fr_path, fr.as_path());
        assert!(fr_path.ends_with("temp/fr.wav_stereo_temp.wav"));

        let plans = muxer.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].input_video, ws.dir.path().join("input.mp4"));
        assert_eq!(&plans[0].tracks, prepared);
        assert_eq!(muxer.missing_inputs(), 0);
        assert_eq!(outcome.output_video, Some(ws.layout.output_video.clone()));

        assert!(outcome.cleanup.is_clean());
        assert!(!fr_path.exists());
        assert!(!ws.layout.scratch_dir.exists());
        assert!(en.exists() && fr.exists());
    }

    #[test]
    fn test_duplicate_language_fails_before_normalizing() {
        let ws = Workspace::new();
        ws.track("en.wav", 1, 1.0);
        ws.track("en-US.wav", 1, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig::default();

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap_err();

        match err {
            PublishError::DuplicateLanguage {
                code,
                existing,
                conflicting,
                ..
            } => {
                assert_eq!(code, "eng");
                assert_eq!(existing, ws.layout.tracks_dir.join("en-US.wav"));
                assert_eq!(conflicting, ws.layout.tracks_dir.join("en.wav"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(codec.exports().is_empty());
        assert!(!ws.layout.scratch_dir.exists());
        assert!(muxer.plans().is_empty());
    }

    #[test]
    fn test_invalid_language_abort() {
        let ws = Workspace::new();
        ws.track("commentary.wav", 2, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig::default();
        let mut interaction = AlwaysAbort::default();

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut interaction)
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidLanguage { ref token, .. } if token == "commentary"));
        assert_eq!(interaction.asked, 1);
    }

    #[test]
    fn test_invalid_language_skipped() {
        let ws = Workspace::new();
        ws.track("commentary.wav", 2, 1.0);
        ws.track("de.wav", 2, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig::default();

        let outcome = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AutoSkip)
            .unwrap();
        let codes: Vec<&str> = outcome
            .prepared
            .tracks
            .iter()
            .map(|t| t.code.as_str())
            .collect();
        assert_eq!(codes, vec!["deu"]);
    }

    #[test]
    fn test_merge_and_save_effects() {
        let ws = Workspace::new();
        ws.track("en.wav", 2, 2.0);
        ws.track("fr.wav", 1, 2.0);
        write_tone(&ws.layout.effects_file, 2, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig {
            merge_effects: true,
            save_merged_tracks: true,
            output_track_format: OutputTrackFormat::Mp3,
            ..PipelineConfig::default()
        };

        let outcome = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap();

        let en = ws.layout.merged_dir.join("With Effects-en.mp3");
        let fr = ws.layout.merged_dir.join("With Effects-fr.mp3");
        assert_eq!(outcome.prepared.path_of("eng"), Some(en.as_path()));
        assert_eq!(outcome.prepared.path_of("fra"), Some(fr.as_path()));
        assert!(en.exists() && fr.exists());
        assert_eq!(codec.load(&fr).unwrap().channel_count(), 2);

        assert!(outcome.cleanup.is_clean());
        assert!(!ws.layout.scratch_dir.exists());
        assert!(ws.layout.effects_file.exists());
    }

    #[test]
    fn test_merge_without_saving_cleans_everything() {
        let ws = Workspace::new();
        ws.track("en.wav", 2, 1.0);
        ws.track("fr.wav", 1, 1.0);
        write_tone(&ws.layout.effects_file, 1, 0.5);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig {
            merge_effects: true,
            save_merged_tracks: false,
            output_track_format: OutputTrackFormat::Same,
            ..PipelineConfig::default()
        };

        let outcome = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap();

        assert_eq!(muxer.missing_inputs(), 0);
        assert!(outcome.cleanup.is_clean());
        assert!(!ws.layout.scratch_dir.exists());
        assert!(!ws.layout.merged_dir.exists());
    }

    #[test]
    fn test_failed_merge_and_save_leaves_no_scratch_files() {
        let ws = Workspace::new();
        ws.track("fr.wav", 1, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig {
            merge_effects: true,
            save_merged_tracks: true,
            ..PipelineConfig::default()
        };

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::Config(_)));
        // The stereo copy of fr.wav was made before the effects lookup.
        assert_eq!(codec.exports().len(), 1);
        assert!(!ws.layout.scratch_dir.exists());
        assert!(!ws.layout.merged_dir.exists());
    }

    #[test]
    fn test_failed_mux_still_cleans_up() {
        let ws = Workspace::new();
        ws.track("fr.wav", 1, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::failing();
        let config = PipelineConfig::default();

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::Mux(_)));
        assert!(!ws.layout.scratch_dir.exists());
    }

    #[test]
    fn test_missing_input_video_fails_first() {
        let ws = Workspace::new();
        fs::remove_file(ws.dir.path().join("input.mp4")).unwrap();
        ws.track("fr.wav", 1, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig::default();

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::NoInputVideo(_)));
        assert!(codec.exports().is_empty());
    }

    #[test]
    fn test_embedding_disabled() {
        let ws = Workspace::new();
        ws.track("en.wav", 2, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig {
            embed_in_video: false,
            ..PipelineConfig::default()
        };

        let outcome = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap();
        assert_eq!(outcome.output_video, None);
        assert_eq!(outcome.prepared.len(), 1);
        assert!(muxer.plans().is_empty());
    }

    #[test]
    fn test_missing_effects_file() {
        let ws = Workspace::new();
        ws.track("en.wav", 2, 1.0);
        let codec = WavCodec::new();
        let muxer = RecordingMuxer::new();
        let config = PipelineConfig {
            merge_effects: true,
            ..PipelineConfig::default()
        };

        let err = Pipeline::new(&config, ws.layout.clone(), &codec, &muxer)
            .run(&mut AlwaysAbort::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn test_layout_paths() {
        let layout = WorkspaceLayout::new(Path::new("/work"), &PathsConfig::default());
        assert_eq!(layout.scratch_dir, PathBuf::from("/work/tracks/temp"));
        assert_eq!(
            layout.merged_dir,
            PathBuf::from("/work/tracks/Merged Effects Tracks")
        );
        assert_eq!(layout.effects_file, PathBuf::from("/work/effect.wav"));
        assert_eq!(layout.output_video, PathBuf::from("/work/output.mp4"));
    }
}
