//! Track model
//!
//! A [`Track`] follows one language's audio file through the pipeline.
//! `source_path` never changes; `current_path` moves to whatever file the
//! last stage produced.

use std::path::{Path, PathBuf};

use crate::error::{PublishError, Result};
use crate::language::Language;

/// Code of the sound effects bed
pub const EFFECTS_CODE: &str = "effects";

/// Which stage produced a track's current scratch file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempMarker {
    /// Stereo copy of a mono source
    StereoTemp,
    /// Plain copy made before the effects overlay
    Staged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub language: Language,
    /// Language token taken from the file name
    pub token: String,
    pub source_path: PathBuf,
    pub current_path: PathBuf,
    /// The current file is scheduled for deletion at the end of the run
    pub is_temporary: bool,
    pub marker: Option<TempMarker>,
}

impl Track {
    pub fn new(language: Language, token: impl Into<String>, source_path: PathBuf) -> Self {
        Self {
            language,
            token: token.into(),
            current_path: source_path.clone(),
            source_path,
            is_temporary: false,
            marker: None,
        }
    }

    /// The sound effects bed. Never part of a [`TrackSet`].
    pub fn effects(source_path: PathBuf) -> Self {
        let language = Language {
            code: EFFECTS_CODE.to_string(),
            display_name: "Sound Effects".to_string(),
        };
        Self::new(language, EFFECTS_CODE, source_path)
    }

    pub fn code(&self) -> &str {
        &self.language.code
    }

    pub fn is_effects(&self) -> bool {
        self.language.code == EFFECTS_CODE
    }

    /// Point the track at a new file produced by a pipeline stage
    pub fn replace_current(&mut self, path: PathBuf, marker: Option<TempMarker>, temporary: bool) {
        self.current_path = path;
        self.marker = marker;
        self.is_temporary = temporary;
    }

    /// Whether the current file is a scratch copy rather than the source
    pub fn is_scratch_copy(&self) -> bool {
        self.marker.is_some() && self.current_path != self.source_path
    }
}

/// Tracks keyed by language code, in insertion order
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: Vec<Track>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track. A second track with the same language code is an error
    /// naming both files; the set is left unchanged.
    pub fn insert(&mut self, track: Track) -> Result<()> {
        if let Some(existing) = self.get(track.code()) {
            return Err(PublishError::DuplicateLanguage {
                code: track.language.code.clone(),
                display_name: track.language.display_name.clone(),
                existing: existing.source_path.clone(),
                conflicting: track.source_path,
            });
        }
        self.tracks.push(track);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.code() == code)
    }

    pub fn source_of(&self, code: &str) -> Option<&Path> {
        self.get(code).map(|t| t.source_path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

/// A track ready to be embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTrack {
    pub code: String,
    pub display_name: String,
    pub path: PathBuf,
}

impl From<Track> for FinalTrack {
    fn from(track: Track) -> Self {
        Self {
            code: track.language.code,
            display_name: track.language.display_name,
            path: track.current_path,
        }
    }
}

/// Ordered `{code: path}` mapping handed to the muxer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedTracks {
    pub tracks: Vec<FinalTrack>,
    /// Language of the video's own audio stream
    pub default_language: String,
}

impl PreparedTracks {
    pub fn new(set: TrackSet, default_language: impl Into<String>) -> Self {
        Self {
            tracks: set.into_tracks().into_iter().map(FinalTrack::from).collect(),
            default_language: default_language.into(),
        }
    }

    pub fn path_of(&self, code: &str) -> Option<&Path> {
        self.tracks
            .iter()
            .find(|t| t.code == code)
            .map(|t| t.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
