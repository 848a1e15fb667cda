//! Input discovery: the source video and the per-language track files

use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::{extension_of, is_track_file};
use crate::error::{PublishError, Result};

/// Video extensions accepted for the input video
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm"];

/// Find the input video in `root`: a file whose stem contains `input`
/// (any case) with a video extension. The first match by name wins.
pub fn find_input_video(root: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = regular_files(root)?
        .into_iter()
        .filter(|path| {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();
            stem.contains("input") && VIDEO_EXTENSIONS.contains(&extension_of(path).as_str())
        })
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        tracing::warn!(
            count = candidates.len(),
            "Several input videos found, using {}",
            candidates[0].display()
        );
    }
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| PublishError::NoInputVideo(root.to_path_buf()))
}

/// Create the track directory if it does not exist yet
pub fn ensure_tracks_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        tracing::info!("Creating tracks directory {}", dir.display());
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Audio track candidates in `dir`, sorted by file name
pub fn scan_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = regular_files(dir)?
        .into_iter()
        .filter(|path| is_track_file(path))
        .collect();
    files.sort();
    tracing::debug!(dir = %dir.display(), count = files.len(), "Scanned track directory");
    Ok(files)
}

fn regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}
