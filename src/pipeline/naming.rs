//! File naming policy for derived tracks
//!
//! Scratch copies keep the full original file name and append a marker plus
//! the extension again (`fr.wav` → `fr.wav_stereo_temp.wav`), so the source
//! name can always be recovered from a scratch name. Merged tracks get a
//! readable name with `With Effects` in front of the language segment.

use crate::audio::AUDIO_EXTENSIONS;

/// Marker of a stereo copy made from a mono source
pub const STEREO_TEMP_MARKER: &str = "_stereo_temp";
/// Marker of a plain copy made before the effects overlay
pub const STAGED_MARKER: &str = "_temp";
/// Inserted before the language segment of a merged track name
pub const WITH_EFFECTS: &str = "With Effects";

/// Scratch name for the stereo copy of `file_name`
pub fn stereo_temp_name(file_name: &str) -> String {
    marked_name(file_name, STEREO_TEMP_MARKER)
}

/// Scratch name for the staged copy of `file_name`
pub fn staged_name(file_name: &str) -> String {
    marked_name(file_name, STAGED_MARKER)
}

fn marked_name(file_name: &str, marker: &str) -> String {
    match split_extension(file_name) {
        (_, Some(ext)) => format!("{}{}.{}", file_name, marker, ext),
        (_, None) => format!("{}{}", file_name, marker),
    }
}

/// Whether a file name carries one of the scratch markers
pub fn has_temp_marker(file_name: &str) -> bool {
    file_name.contains(STAGED_MARKER)
}

/// Permanent name of a merged track.
///
/// `file_name` is the finalized scratch file's name and `token` the
/// language token of the source file. Markers and the leftover inner
/// extension are removed, then `With Effects-` goes right before the
/// language segment: the token when the name ends with it, otherwise the
/// text after the last hyphen.
pub fn merged_track_name(file_name: &str, token: &str) -> String {
    let unmarked = file_name
        .replace(STEREO_TEMP_MARKER, "")
        .replace(STAGED_MARKER, "");

    let (stem, ext) = split_extension(&unmarked);
    let stem = strip_audio_extension(stem);

    let token = token.trim();
    let (prefix, segment) = if !token.is_empty() && stem.ends_with(token) {
        (&stem[..stem.len() - token.len()], token)
    } else {
        match stem.rfind('-') {
            Some(idx) => (&stem[..idx], stem[idx + 1..].trim()),
            None => ("", stem.trim()),
        }
    };

    let prefix = prefix.trim_end_matches(['-', '_', ' ']);
    let mut name = if prefix.is_empty() {
        format!("{}-{}", WITH_EFFECTS, segment)
    } else {
        format!("{} {}-{}", prefix, WITH_EFFECTS, segment)
    };
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Split `name` at its last dot. A leading dot does not count.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

fn strip_audio_extension(stem: &str) -> &str {
    match split_extension(stem) {
        (inner, Some(ext)) if AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            inner
        }
        _ => stem,
    }
}
