use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dubmux
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Invalid language code '{token}' for file: {}", file.display())]
    InvalidLanguage { token: String, file: PathBuf },

    #[error(
        "Language '{display_name}' ({code}) is already in use by file {} (conflicts with {})",
        existing.display(),
        conflicting.display()
    )]
    DuplicateLanguage {
        code: String,
        display_name: String,
        existing: PathBuf,
        conflicting: PathBuf,
    },

    #[error("Internal pipeline error: {0}")]
    InvariantViolation(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No input video found in {}", .0.display())]
    NoInputVideo(PathBuf),

    #[error("Muxing error: {0}")]
    Mux(String),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Reasons a language token is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LanguageError {
    #[error("'{0}' is not a language tag")]
    Unparsable(String),

    #[error("'{0}' does not name a language")]
    Undetermined(String),

    #[error("'{0}' is not an ISO 639 language")]
    Unknown(String),
}

/// FFmpeg-backed codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    #[error("No audio stream in {0}")]
    NoAudioStream(String),

    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    #[error("Failed to configure encoder: {0}")]
    EncoderConfigure(String),

    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    #[error("Failed to decode audio: {0}")]
    DecodePacket(String),

    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    #[error("Failed to read frame: {0}")]
    ReadFrame(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Upload client errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("The upload failed with an unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Upload server did not return a session URL")]
    MissingSessionUrl,

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Upload made no progress: server holds {committed} of {total} bytes")]
    Stalled { committed: u64, total: u64 },

    #[error("Max retries ({0}) reached, no longer attempting to retry")]
    RetriesExhausted(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PublishError>;
