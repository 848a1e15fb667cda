//! Sound effects overlay
//!
//! Runs in two passes over the track set. Staging copies every track that
//! still points at a source file into the scratch directory, so the
//! overlay pass only ever writes to scratch copies. The overlay pass mixes
//! the effects bed into each copy and either leaves the result in scratch
//! or moves it into the merged tracks directory under a readable name.

use std::collections::btree_map::{BTreeMap, Entry};
use std::fs;
use std::io;
use std::path::Path;

use crate::audio::{extension_of, AudioBuffer, AudioCodec, MERGED_TRACK_BITRATE};
use crate::config::PipelineConfig;
use crate::error::{CodecError, PublishError, Result};
use crate::tracks::{TempMarker, Track, TrackSet};

use super::ledger::TempFileLedger;
use super::naming::{has_temp_marker, merged_track_name, staged_name};
use super::normalize::ScratchDir;

/// The effects bed, decoded once for every track sample rate it meets
pub struct EffectsBed<'a> {
    codec: &'a dyn AudioCodec,
    path: &'a Path,
    by_rate: BTreeMap<u32, AudioBuffer>,
}

impl<'a> EffectsBed<'a> {
    pub fn new(codec: &'a dyn AudioCodec, path: &'a Path) -> Self {
        Self {
            codec,
            path,
            by_rate: BTreeMap::new(),
        }
    }

    pub fn at_rate(&mut self, sample_rate: u32) -> Result<&AudioBuffer> {
        match self.by_rate.entry(sample_rate) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let audio = self.codec.load_at(self.path, sample_rate)?;
                tracing::debug!(
                    sample_rate,
                    effects_secs = audio.duration().as_secs_f64(),
                    "Decoded sound effects"
                );
                Ok(entry.insert(audio))
            }
        }
    }

    /// Sample rates decoded so far
    pub fn rates(&self) -> Vec<u32> {
        self.by_rate.keys().copied().collect()
    }
}

pub struct EffectsMerger<'a> {
    codec: &'a dyn AudioCodec,
    config: &'a PipelineConfig,
}

impl<'a> EffectsMerger<'a> {
    pub fn new(codec: &'a dyn AudioCodec, config: &'a PipelineConfig) -> Self {
        Self { codec, config }
    }

    /// Stage, overlay and finalize every track in `tracks`
    pub fn merge(
        &self,
        tracks: &mut TrackSet,
        effects: &Track,
        scratch: &mut ScratchDir,
        merged_dir: &Path,
        ledger: &mut TempFileLedger,
    ) -> Result<()> {
        self.stage(tracks, scratch, ledger)?;

        for track in tracks.iter() {
            check_staged(track)?;
        }

        let mut bed = EffectsBed::new(self.codec, &effects.current_path);
        tracing::info!(
            tracks = tracks.len(),
            effects = %effects.current_path.display(),
            "Merging sound effects"
        );
        for track in tracks.iter_mut() {
            self.finalize(track, &mut bed, merged_dir, ledger)?;
        }
        Ok(())
    }

    /// Copy tracks that still point at their source into scratch.
    /// Tracks that already have a scratch copy are left alone.
    pub fn stage(
        &self,
        tracks: &mut TrackSet,
        scratch: &mut ScratchDir,
        ledger: &mut TempFileLedger,
    ) -> Result<()> {
        for track in tracks.iter_mut() {
            if track.marker.is_some() {
                continue;
            }
            let file_name = file_name_of(&track.current_path);
            let target = scratch.ensure(ledger)?.join(staged_name(&file_name));
            fs::copy(&track.current_path, &target)?;
            tracing::debug!(
                track = %track.code(),
                from = %track.current_path.display(),
                to = %target.display(),
                "Staged track"
            );
            ledger.add(&target);
            track.replace_current(target, Some(TempMarker::Staged), true);
        }
        Ok(())
    }

    fn finalize(
        &self,
        track: &mut Track,
        bed: &mut EffectsBed<'_>,
        merged_dir: &Path,
        ledger: &mut TempFileLedger,
    ) -> Result<()> {
        check_staged(track)?;

        let audio = self.codec.load(&track.current_path)?;
        let combined = audio.overlay(bed.at_rate(audio.sample_rate())?)?;

        let extension = extension_of(&track.current_path);
        let format = self
            .config
            .output_track_format
            .resolve(&extension)
            .ok_or_else(|| {
                CodecError::EncoderConfigure(format!(
                    "No output container for '{}' ({})",
                    extension,
                    track.current_path.display()
                ))
            })?;

        let target = if format.extension() == extension {
            track.current_path.clone()
        } else {
            // The staged file is superseded by the re-encoded one.
            ledger.add(&track.current_path);
            track.current_path.with_extension(format.extension())
        };

        self.codec
            .export(&combined, &target, format, MERGED_TRACK_BITRATE)?;
        tracing::info!(
            track = %track.code(),
            format = format.extension(),
            "Mixed effects into {}",
            file_name_of(&track.source_path)
        );

        if self.config.save_merged_tracks {
            fs::create_dir_all(merged_dir)?;
            let destination =
                merged_dir.join(merged_track_name(&file_name_of(&target), &track.token));
            move_file(&target, &destination)?;
            tracing::info!(
                track = %track.code(),
                "Saved merged track {}",
                destination.display()
            );
            track.replace_current(destination, None, false);
        } else {
            ledger.add(&target);
            let marker = track.marker;
            track.replace_current(target, marker, true);
        }
        Ok(())
    }
}

/// The overlay must never write over a source file
fn check_staged(track: &Track) -> Result<()> {
    if track.is_scratch_copy() && has_temp_marker(&file_name_of(&track.current_path)) {
        Ok(())
    } else {
        Err(PublishError::InvariantViolation(format!(
            "track {} has no temporary copy, refusing to overwrite {}",
            track.code(),
            track.current_path.display()
        )))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rename, or copy and delete when the rename crosses filesystems
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e.into()),
        Err(e) => {
            tracing::debug!("rename failed ({}), copying {} instead", e, from.display());
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ExportFormat;
    use crate::config::OutputTrackFormat;
    use crate::testing::{english, french, write_tone, write_tone_at, WavCodec};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        codec: WavCodec,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                codec: WavCodec::new(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn scratch(&self) -> ScratchDir {
            ScratchDir::new(self.path("temp"))
        }

        fn effects(&self, secs: f64) -> Track {
            let path = self.path("effect.wav");
            write_tone(&path, 2, secs);
            Track::effects(path)
        }
    }

    fn config(save: bool, format: OutputTrackFormat) -> PipelineConfig {
        PipelineConfig {
            merge_effects: true,
            save_merged_tracks: save,
            output_track_format: format,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_staging_copies_sources_once() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone(&source, 2, 1.0);
        let config = config(false, OutputTrackFormat::Same);
        let merger = EffectsMerger::new(&fx.codec, &config);

        let mut set = TrackSet::new();
        set.insert(english(&source)).unwrap();
        let mut scratch = fx.scratch();
        let mut ledger = TempFileLedger::new();

        merger.stage(&mut set, &mut scratch, &mut ledger).unwrap();
        let staged = set.get("eng").unwrap().current_path.clone();
        assert_eq!(staged, fx.path("temp").join("en.wav_temp.wav"));
        assert!(staged.exists());
        assert!(ledger.contains(&staged));

        merger.stage(&mut set, &mut scratch, &mut ledger).unwrap();
        assert_eq!(set.get("eng").unwrap().current_path, staged);
        assert!(!fx.path("temp").join("en.wav_temp.wav_temp.wav").exists());
    }

    #[test]
    fn test_stereo_temp_tracks_are_not_restaged() {
        let fx = Fixture::new();
        let stereo = fx.path("fr.wav_stereo_temp.wav");
        write_tone(&stereo, 2, 1.0);
        let mut track = french(&fx.path("fr.wav"));
        track.replace_current(stereo.clone(), Some(TempMarker::StereoTemp), true);

        let config = config(false, OutputTrackFormat::Same);
        let mut set = TrackSet::new();
        set.insert(track).unwrap();
        EffectsMerger::new(&fx.codec, &config)
            .stage(&mut set, &mut fx.scratch(), &mut TempFileLedger::new())
            .unwrap();
        assert_eq!(set.get("fra").unwrap().current_path, stereo);
    }

    #[test]
    fn test_overlay_without_saving_stays_in_scratch() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone(&source, 2, 2.0);
        let before = fs::read(&source).unwrap();
        let effects = fx.effects(0.5);
        let config = config(false, OutputTrackFormat::Same);

        let mut set = TrackSet::new();
        set.insert(english(&source)).unwrap();
        let mut ledger = TempFileLedger::new();
        EffectsMerger::new(&fx.codec, &config)
            .merge(&mut set, &effects, &mut fx.scratch(), &fx.path("merged"), &mut ledger)
            .unwrap();

        let track = set.get("eng").unwrap();
        assert_eq!(track.current_path, fx.path("temp").join("en.wav_temp.wav"));
        assert!(track.is_temporary);
        assert!(ledger.contains(&track.current_path));
        assert!(!fx.path("merged").exists());
        assert_eq!(fs::read(&source).unwrap(), before);

        let merged = fx.codec.load(&track.current_path).unwrap();
        assert_eq!(merged.frames(), 2 * crate::testing::TEST_SAMPLE_RATE as usize);
        let export = &fx.codec.exports()[0];
        assert_eq!(export.format, ExportFormat::Wav);
        assert_eq!(export.bitrate, MERGED_TRACK_BITRATE);
    }

    #[test]
    fn test_saved_track_is_moved_and_renamed() {
        let fx = Fixture::new();
        let source = fx.path("en-US.wav");
        write_tone(&source, 2, 1.0);
        let effects = fx.effects(3.0);
        let config = config(true, OutputTrackFormat::Mp3);

        let mut track = english(&source);
        track.token = "en-US".to_string();
        let mut set = TrackSet::new();
        set.insert(track).unwrap();
        let mut ledger = TempFileLedger::new();
        let merged_dir = fx.path("Merged Effects Tracks");
        EffectsMerger::new(&fx.codec, &config)
            .merge(&mut set, &effects, &mut fx.scratch(), &merged_dir, &mut ledger)
            .unwrap();

        let track = set.get("eng").unwrap();
        let expected = merged_dir.join("With Effects-en-US.mp3");
        assert_eq!(track.current_path, expected);
        assert!(expected.exists());
        assert!(!track.is_temporary);
        assert_eq!(track.marker, None);
        assert!(!ledger.contains(&expected));
        assert!(!ledger.contains_dir(&merged_dir));

        // The staged .wav copy was replaced by the .mp3 export.
        let staged = fx.path("temp").join("en-US.wav_temp.wav");
        assert!(ledger.contains(&staged));
        assert!(!fx.path("temp").join("en-US.wav_temp.mp3").exists());

        // Long effects are cut to the track length.
        let merged = fx.codec.load(&expected).unwrap();
        assert_eq!(merged.frames(), crate::testing::TEST_SAMPLE_RATE as usize);
    }

    #[test]
    fn test_unstaged_track_is_invariant_violation() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone(&source, 2, 1.0);
        let before = fs::read(&source).unwrap();
        let effects = fx.effects(1.0);
        let config = config(false, OutputTrackFormat::Same);

        let mut track = english(&source);
        track.marker = Some(TempMarker::Staged);
        let mut bed = EffectsBed::new(&fx.codec, &effects.current_path);
        let mut ledger = TempFileLedger::new();
        let err = EffectsMerger::new(&fx.codec, &config)
            .finalize(&mut track, &mut bed, &fx.path("merged"), &mut ledger)
            .unwrap_err();

        assert!(matches!(err, PublishError::InvariantViolation(_)));
        assert!(fx.codec.exports().is_empty());
        assert_eq!(fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_copy_without_scratch_marker_is_invariant_violation() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone(&source, 2, 1.0);
        let other = fx.path("en-copy.wav");
        fs::copy(&source, &other).unwrap();
        let effects = fx.effects(1.0);
        let config = config(false, OutputTrackFormat::Same);

        let mut track = english(&source);
        track.replace_current(other.clone(), Some(TempMarker::Staged), true);
        let mut bed = EffectsBed::new(&fx.codec, &effects.current_path);
        let err = EffectsMerger::new(&fx.codec, &config)
            .finalize(&mut track, &mut bed, &fx.path("merged"), &mut TempFileLedger::new())
            .unwrap_err();

        assert!(matches!(err, PublishError::InvariantViolation(_)));
        assert!(fx.codec.exports().is_empty());
    }

    #[test]
    fn test_effects_decoded_at_each_track_rate() {
        let fx = Fixture::new();
        let en = fx.path("en.wav");
        let fr = fx.path("fr.wav");
        write_tone(&en, 2, 1.0);
        write_tone(&fr, 2, 1.0);
        let effects = fx.effects(0.5);
        let config = config(false, OutputTrackFormat::Same);

        let mut set = TrackSet::new();
        set.insert(english(&en)).unwrap();
        set.insert(french(&fr)).unwrap();
        let merger = EffectsMerger::new(&fx.codec, &config);
        merger
            .stage(&mut set, &mut fx.scratch(), &mut TempFileLedger::new())
            .unwrap();

        let mut bed = EffectsBed::new(&fx.codec, &effects.current_path);
        for track in set.iter_mut() {
            merger
                .finalize(track, &mut bed, &fx.path("merged"), &mut TempFileLedger::new())
                .unwrap();
        }
        assert_eq!(bed.rates(), vec![crate::testing::TEST_SAMPLE_RATE]);
    }

    #[test]
    fn test_track_rate_is_requested_from_codec() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone_at(&source, 16000, 2, 0.5);
        let effects = fx.effects(0.5);
        let config = config(false, OutputTrackFormat::Same);

        let mut set = TrackSet::new();
        set.insert(english(&source)).unwrap();
        let mut ledger = TempFileLedger::new();
        let err = EffectsMerger::new(&fx.codec, &config)
            .merge(&mut set, &effects, &mut fx.scratch(), &fx.path("merged"), &mut ledger)
            .unwrap_err();

        // The test codec cannot resample, so the 16 kHz request surfaces.
        match err {
            PublishError::Codec(CodecError::ResamplerCreate(msg)) => {
                assert!(msg.contains("16000 Hz requested"), "{}", msg)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_staged_copies_ledgered_when_saving() {
        let fx = Fixture::new();
        let source = fx.path("en.wav");
        write_tone(&source, 2, 1.0);
        let config = config(true, OutputTrackFormat::Same);

        let mut set = TrackSet::new();
        set.insert(english(&source)).unwrap();
        let mut ledger = TempFileLedger::new();
        EffectsMerger::new(&fx.codec, &config)
            .stage(&mut set, &mut fx.scratch(), &mut ledger)
            .unwrap();
        assert!(ledger.contains(&set.get("eng").unwrap().current_path));
    }
}
