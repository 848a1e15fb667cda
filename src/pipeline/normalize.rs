//! Channel normalization
//!
//! Every embedded track must be stereo. Mono sources get a stereo copy in
//! the scratch directory; everything else is used as is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::{extension_of, AudioCodec, ExportFormat, STEREO_COPY_BITRATE};
use crate::error::{CodecError, Result};
use crate::tracks::{TempMarker, Track};

use super::ledger::TempFileLedger;
use super::naming::stereo_temp_name;

/// Scratch directory, created on first use and registered for cleanup
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    ready: bool,
}

impl ScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ready: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory if needed and return its path
    pub fn ensure(&mut self, ledger: &mut TempFileLedger) -> Result<&Path> {
        if !self.ready {
            fs::create_dir_all(&self.path)?;
            ledger.add_dir(&self.path);
            self.ready = true;
            tracing::debug!(dir = %self.path.display(), "Scratch directory ready");
        }
        Ok(&self.path)
    }
}

pub struct TrackNormalizer<'a> {
    codec: &'a dyn AudioCodec,
}

impl<'a> TrackNormalizer<'a> {
    pub fn new(codec: &'a dyn AudioCodec) -> Self {
        Self { codec }
    }

    /// Make `track` stereo. Only a channel count of exactly one is converted.
    pub fn normalize(
        &self,
        mut track: Track,
        scratch: &mut ScratchDir,
        ledger: &mut TempFileLedger,
    ) -> Result<Track> {
        let audio = self.codec.load(&track.current_path)?;
        let channels = audio.channel_count();
        if channels != 1 {
            tracing::debug!(
                track = %track.code(),
                channels,
                "Track is not mono, using it as is"
            );
            return Ok(track);
        }

        let file_name = track
            .current_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(track.code())
            .to_string();
        let extension = extension_of(&track.current_path);
        let format = ExportFormat::from_extension(&extension).ok_or_else(|| {
            CodecError::EncoderConfigure(format!(
                "No output container for '{}' ({})",
                extension,
                track.current_path.display()
            ))
        })?;

        let target = scratch.ensure(ledger)?.join(stereo_temp_name(&file_name));
        tracing::info!(
            track = %track.code(),
            "Converting mono track {} to stereo",
            file_name
        );
        self.codec
            .export(&audio.set_channels(2), &target, format, STEREO_COPY_BITRATE)?;

        // Moved away when a merged track is saved; the drain then counts it
        // as missing.
        ledger.add(&target);
        track.replace_current(target, Some(TempMarker::StereoTemp), true);
        Ok(track)
    }
}
