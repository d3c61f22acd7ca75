//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_DISPLAY_CAP_SECS;

/// Caption engine configuration
///
/// Constructed by the host application; there are no config files, CLI
/// flags, or environment variables behind this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transcription service endpoint receiving the multipart upload
    pub endpoint: String,

    /// Ceiling on how long a single caption stays active, in seconds
    pub display_cap_secs: f64,

    /// Connect timeout for the streaming request, in seconds.
    /// There is no whole-request timeout: a run streams for as long as the
    /// service keeps transcribing.
    pub connect_timeout_secs: u64,

    /// Capacity of the engine event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/transcribe".to_string(),
            display_cap_secs: DEFAULT_DISPLAY_CAP_SECS,
            connect_timeout_secs: 10,
            event_capacity: 256,
        }
    }
}
