//! Engine event notifications
//!
//! The engine holds no rendering logic; it emits notifications for a
//! consumer (the player UI) to subscribe to and re-render from.

use crate::engine::RunId;
use crate::types::{CaptionSegment, ControlEvent};

/// Notification emitted by the engine as a run progresses
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new run started; all state of any prior run was discarded
    RunStarted { run: RunId },

    /// A caption segment was appended to the store. The full ordered
    /// sequence is available from `CaptionEngine::segments`.
    SegmentAdded {
        run: RunId,
        index: usize,
        segment: CaptionSegment,
    },

    /// A control line was observed (diagnostics only, never stored)
    ControlReceived { run: RunId, control: ControlEvent },

    /// A line was skipped as unparseable or malformed
    ParseWarning {
        run: RunId,
        line: String,
        message: String,
    },

    /// The active segment changed between playback ticks
    ActiveSegmentChanged {
        run: RunId,
        active: Option<CaptionSegment>,
    },

    /// The stream ended cleanly
    RunCompleted {
        run: RunId,
        segments: usize,
        warnings: u32,
    },

    /// The run failed at the transport level; stored segments remain usable
    RunFailed { run: RunId, message: String },
}
