//! Wire types for the transcription event stream
//!
//! The response body is a sequence of newline-delimited JSON values, one
//! object per line, in two shapes:
//! - control: `{"status": "processing"}` or `{"status": "completed"}`
//! - caption: `{"start": 1.2, "end": 3.4, "text": "...", "translation": "..."}`
//!
//! Absence of `status` (or a value other than the two recognized control
//! values) classifies a line as a caption.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LineError;

/// One recognized unit of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    /// Seconds from media start, inclusive lower bound of applicability
    pub start: f64,

    /// Seconds from media start, upper bound of the segment's natural duration
    pub end: f64,

    /// Transcribed text in the source language
    pub text: String,

    /// Translated text, present only when a target language was requested.
    /// The service sends an explicit JSON `null` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl CaptionSegment {
    /// Natural duration in seconds, before the display cap is applied
    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }
}

/// Recognized control statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    Processing,
    Completed,
}

/// A non-caption status message in the stream
///
/// Observed and surfaced to diagnostics, never stored as a caption.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ControlEvent {
    pub status: ControlStatus,

    /// Detected source language, sent alongside the first `processing` line
    #[serde(default)]
    pub language: Option<String>,
}

/// A classified line of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Segment(CaptionSegment),
    Control(ControlEvent),
}

impl StreamEvent {
    /// Classify one complete line of the stream.
    ///
    /// Anything that matches neither wire shape is a [`LineError`]; the
    /// caller skips the line and keeps decoding.
    pub fn classify(line: &str) -> Result<Self, LineError> {
        let value: Value = serde_json::from_str(line)?;
        match value.get("status").and_then(Value::as_str) {
            Some("processing") | Some("completed") => {
                let control: ControlEvent = serde_json::from_value(value)?;
                Ok(StreamEvent::Control(control))
            }
            _ => {
                let segment: CaptionSegment = serde_json::from_value(value)
                    .map_err(|e| LineError::MalformedSegment(e.to_string()))?;
                if segment.text.is_empty() {
                    return Err(LineError::MalformedSegment(
                        "empty caption text".to_string(),
                    ));
                }
                Ok(StreamEvent::Segment(segment))
            }
        }
    }
}
