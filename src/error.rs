use thiserror::Error;

/// Run-fatal errors for the caption engine
///
/// Any of these ends the current run; segments appended before the failure
/// stay in the store and remain displayable.
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transcription service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Per-line recoverable errors
///
/// A line that fails to decode is skipped and reported; it never aborts the
/// stream.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed caption segment: {0}")]
    MalformedSegment(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CaptionError>;
