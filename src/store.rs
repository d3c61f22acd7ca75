//! Segment store and active-segment selection

use crate::types::CaptionSegment;

/// Ceiling on how long a segment stays active regardless of its natural
/// duration, in seconds. Keeps unusually long segments from sitting on
/// screen indefinitely.
pub const DEFAULT_DISPLAY_CAP_SECS: f64 = 4.0;

/// Ordered store of caption segments for one transcription run
///
/// Segments are kept in arrival order. The service normally emits them with
/// non-decreasing `start`, but the store does not rely on that: selection is
/// a full scan in storage order, so out-of-order arrivals still resolve.
#[derive(Debug)]
pub struct SegmentStore {
    segments: Vec<CaptionSegment>,
    display_cap_secs: f64,
}

impl SegmentStore {
    pub fn new(display_cap_secs: f64) -> Self {
        Self {
            segments: Vec::new(),
            display_cap_secs,
        }
    }

    /// Append a segment in arrival order. Never rejects a well-formed
    /// segment and performs no deduplication.
    pub fn append(&mut self, segment: CaptionSegment) -> usize {
        self.segments.push(segment);
        self.segments.len() - 1
    }

    /// Clear all segments. Called once at the start of each run, before any
    /// of that run's bytes are processed.
    pub fn reset(&mut self) {
        self.segments.clear();
    }

    /// Index of the segment active at `position`, if any.
    ///
    /// A segment is active while `position` lies within
    /// `[start, min(end, start + cap)]`. When stored segments overlap, the
    /// first match in storage order wins; the tie-break is deterministic,
    /// documented behavior, not an error.
    pub fn active_index(&self, position: f64) -> Option<usize> {
        self.segments.iter().position(|s| {
            position >= s.start && position <= s.end.min(s.start + self.display_cap_secs)
        })
    }

    /// Segment active at `position`, if any. Pure query: never mutates the
    /// store, and a linear scan stays well under a playback tick at the
    /// tens-to-hundreds of segments a transcript produces.
    pub fn active_at(&self, position: f64) -> Option<&CaptionSegment> {
        self.active_index(position).map(|i| &self.segments[i])
    }

    /// Stored segments in arrival order
    pub fn segments(&self) -> &[CaptionSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn display_cap_secs(&self) -> f64 {
        self.display_cap_secs
    }
}

impl Default for SegmentStore {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_CAP_SECS)
    }
}
