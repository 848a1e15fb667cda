//! In-memory audio and the codec seam
//!
//! Tracks are decoded into an [`AudioBuffer`] (planar f32 PCM), transformed
//! in memory (channel conversion, overlay) and written back through an
//! [`AudioCodec`]. The production codec lives in [`crate::transcode`].

pub mod buffer;

pub use buffer::AudioBuffer;

use std::path::Path;

use crate::error::Result;

/// Bitrate used when writing stereo copies of mono tracks
pub const STEREO_COPY_BITRATE: u64 = 128_000;
/// Bitrate used when writing tracks with the effects bed mixed in
pub const MERGED_TRACK_BITRATE: u64 = 192_000;

/// Audio extensions accepted as language tracks
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "aac", "wav"];

/// Output container for an exported track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Mp3,
    Wav,
    /// Raw AAC in ADTS framing, stored with the `.aac` extension
    Adts,
}

impl ExportFormat {
    /// Container for a file extension. `aac` maps to ADTS.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => Some(ExportFormat::Mp3),
            "wav" => Some(ExportFormat::Wav),
            "aac" => Some(ExportFormat::Adts),
            _ => None,
        }
    }

    /// Visible file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
            ExportFormat::Adts => "aac",
        }
    }

    /// FFmpeg muxer name
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
            ExportFormat::Adts => "adts",
        }
    }
}

/// Reads and writes audio files
pub trait AudioCodec {
    /// Decode the first audio stream of `path`
    fn load(&self, path: &Path) -> Result<AudioBuffer>;

    /// Decode the first audio stream of `path`, resampled to `sample_rate`
    fn load_at(&self, path: &Path, sample_rate: u32) -> Result<AudioBuffer>;

    /// Encode `audio` into `path` using the given container and bitrate (bps)
    fn export(&self, audio: &AudioBuffer, path: &Path, format: ExportFormat, bitrate: u64)
        -> Result<()>;
}

/// Lower-cased extension of `path`, empty when there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether `path` has one of the accepted track extensions
pub fn is_track_file(path: &Path) -> bool {
    AUDIO_EXTENSIONS.contains(&extension_of(path).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_from_extension() {
        assert_eq!(ExportFormat::from_extension("MP3"), Some(ExportFormat::Mp3));
        assert_eq!(ExportFormat::from_extension("aac"), Some(ExportFormat::Adts));
        assert_eq!(ExportFormat::from_extension("flac"), None);
    }

    #[test]
    fn test_adts_keeps_aac_suffix() {
        assert_eq!(ExportFormat::Adts.extension(), "aac");
        assert_eq!(ExportFormat::Adts.muxer_name(), "adts");
    }

    #[test]
    fn test_is_track_file() {
        assert!(is_track_file(Path::new("tracks/en.mp3")));
        assert!(is_track_file(Path::new("tracks/fr.WAV")));
        assert!(!is_track_file(Path::new("tracks/notes.txt")));
        assert!(!is_track_file(Path::new("tracks/noext")));
    }
}
