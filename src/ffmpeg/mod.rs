//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Log level setup
//! - Safe access to audio frame planes and codec parameters

pub mod helpers;

pub use ffmpeg_next as ffmpeg;

/// Initialize FFmpeg library
///
/// This should be called once at application startup.
/// Returns an error if FFmpeg fails to initialize.
pub fn init() -> Result<(), crate::error::CodecError> {
    ffmpeg::init().map_err(|e| {
        crate::error::CodecError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Lower FFmpeg's own logging to warnings so decoding a track does not
/// flood stderr with demuxer chatter.
pub fn quiet_logging() {
    // SAFETY: av_log_set_level only stores an integer in a global; it is
    // called once at startup before any decoding thread exists.
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
    }
}

/// Version of the linked libavutil, e.g. `libavutil 60.8.100`
pub fn version_info() -> String {
    let v = ffmpeg::util::version();
    format!("libavutil {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}
