//! Streaming caption engine
//!
//! Core of an AI media player front end: consumes a transcription service's
//! newline-delimited JSON response incrementally, accumulates timestamped
//! caption segments as they arrive, and answers, on every playback tick,
//! which caption should be on screen. A fixed display-duration cap keeps
//! unusually long segments from lingering.
//!
//! The host application supplies a media payload plus an optional
//! target-language code, drives the playback clock, and renders whatever
//! [`CaptionEngine`] currently reports; everything else lives here.

mod client;
mod config;
mod decoder;
mod engine;
mod error;
mod events;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use client::{MediaUpload, RunOutcome, TranscribeClient};
pub use config::EngineConfig;
pub use decoder::{LineOutcome, ParseWarning, StreamDecoder};
pub use engine::{CaptionEngine, RunId, RunPhase};
pub use error::{CaptionError, LineError, Result};
pub use events::EngineEvent;
pub use store::{SegmentStore, DEFAULT_DISPLAY_CAP_SECS};
pub use types::{CaptionSegment, ControlEvent, ControlStatus, StreamEvent};
