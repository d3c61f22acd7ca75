//! Caption engine: run lifecycle and time-synchronized queries
//!
//! Owns the segment store for the current transcription run and answers,
//! for a given playback position, which segment is active. State machine
//! per run: `Idle -> Streaming -> (Completed | Failed)`, re-entering
//! `Streaming` only via a fresh [`CaptionEngine::begin_run`].
//!
//! Every mutation carries a [`RunId`]; outcomes tagged with a superseded
//! run's id are dropped, so a late-arriving chunk from an abandoned stream
//! can never touch the current run's store.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decoder::LineOutcome;
use crate::error::CaptionError;
use crate::events::EngineEvent;
use crate::store::SegmentStore;
use crate::types::{CaptionSegment, StreamEvent};

/// Identity of one transcription run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a transcription run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run has started yet
    Idle,
    /// The response stream is being consumed
    Streaming,
    /// The stream ended cleanly
    Completed,
    /// The transport failed; segments appended before the failure remain
    Failed,
}

struct EngineState {
    run: RunId,
    phase: RunPhase,
    store: SegmentStore,
    detected_language: Option<String>,
    warnings: u32,
    /// Index last reported through `ActiveSegmentChanged`
    last_active: Option<usize>,
}

struct EngineInner {
    state: RwLock<EngineState>,
    events: broadcast::Sender<EngineEvent>,
    config: EngineConfig,
}

/// Handle to the caption engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CaptionEngine {
    inner: Arc<EngineInner>,
}

impl CaptionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let state = EngineState {
            run: RunId::new(),
            phase: RunPhase::Idle,
            store: SegmentStore::new(config.display_cap_secs),
            detected_language: None,
            warnings: 0,
            last_active: None,
        };
        Self {
            inner: Arc::new(EngineInner {
                state: RwLock::new(state),
                events,
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribe to engine notifications
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Start a new run, discarding all state of any previous run.
    ///
    /// Any in-flight run is superseded from this point on: outcomes applied
    /// under its id are ignored.
    pub fn begin_run(&self) -> RunId {
        let run = RunId::new();
        {
            let mut state = self.inner.state.write();
            state.run = run;
            state.phase = RunPhase::Streaming;
            state.store.reset();
            state.detected_language = None;
            state.warnings = 0;
            state.last_active = None;
        }
        tracing::info!("transcription run {run} started");
        self.emit(EngineEvent::RunStarted { run });
        run
    }

    /// Whether `run` is still the engine's current run
    pub fn is_current(&self, run: RunId) -> bool {
        self.inner.state.read().run == run
    }

    /// Apply one decoded line outcome under a run identity.
    ///
    /// Returns `false` (and mutates nothing) when `run` is stale or the run
    /// is no longer streaming.
    pub fn apply(&self, run: RunId, outcome: LineOutcome) -> bool {
        let mut state = self.inner.state.write();
        if state.run != run || state.phase != RunPhase::Streaming {
            tracing::debug!("dropping outcome from superseded run {run}");
            return false;
        }
        match outcome {
            LineOutcome::Event(StreamEvent::Segment(segment)) => {
                let index = state.store.append(segment.clone());
                drop(state);
                tracing::debug!(
                    "segment {index} added: [{:.2}s, {:.2}s] {:?}",
                    segment.start,
                    segment.end,
                    segment.text
                );
                self.emit(EngineEvent::SegmentAdded { run, index, segment });
            }
            LineOutcome::Event(StreamEvent::Control(control)) => {
                if let Some(language) = &control.language {
                    state.detected_language = Some(language.clone());
                }
                drop(state);
                tracing::debug!("control line observed: {:?}", control.status);
                self.emit(EngineEvent::ControlReceived { run, control });
            }
            LineOutcome::Warning(warning) => {
                state.warnings += 1;
                drop(state);
                tracing::warn!("skipping line {:?}: {}", warning.line, warning.error);
                self.emit(EngineEvent::ParseWarning {
                    run,
                    line: warning.line,
                    message: warning.error.to_string(),
                });
            }
        }
        true
    }

    /// Mark the run completed after a clean end of stream
    pub fn complete_run(&self, run: RunId) -> bool {
        let (segments, warnings) = {
            let mut state = self.inner.state.write();
            if state.run != run || state.phase != RunPhase::Streaming {
                return false;
            }
            state.phase = RunPhase::Completed;
            (state.store.len(), state.warnings)
        };
        tracing::info!("run {run} completed: {segments} segments, {warnings} warnings");
        self.emit(EngineEvent::RunCompleted {
            run,
            segments,
            warnings,
        });
        true
    }

    /// Mark the run failed. Segments appended before the failure remain
    /// stored and displayable.
    pub fn fail_run(&self, run: RunId, error: &CaptionError) -> bool {
        {
            let mut state = self.inner.state.write();
            if state.run != run || state.phase != RunPhase::Streaming {
                return false;
            }
            state.phase = RunPhase::Failed;
        }
        tracing::error!("run {run} failed: {error}");
        self.emit(EngineEvent::RunFailed {
            run,
            message: error.to_string(),
        });
        true
    }

    /// Segment active at `position`, if any.
    ///
    /// Pure query: identical inputs give identical results until the next
    /// append, and the store is never mutated. Safe to call on every
    /// playback-time-change notification.
    pub fn active_segment(&self, position: f64) -> Option<CaptionSegment> {
        self.inner.state.read().store.active_at(position).cloned()
    }

    /// Playback-tick entry point: selects the active segment and emits
    /// [`EngineEvent::ActiveSegmentChanged`] when it differs from the one
    /// last reported.
    pub fn tick(&self, position: f64) -> Option<CaptionSegment> {
        let mut state = self.inner.state.write();
        let index = state.store.active_index(position);
        let active = index.map(|i| state.store.segments()[i].clone());
        if index == state.last_active {
            return active;
        }
        state.last_active = index;
        let run = state.run;
        drop(state);
        self.emit(EngineEvent::ActiveSegmentChanged {
            run,
            active: active.clone(),
        });
        active
    }

    /// Snapshot of the stored segments in arrival order
    pub fn segments(&self) -> Vec<CaptionSegment> {
        self.inner.state.read().store.segments().to_vec()
    }

    pub fn segment_count(&self) -> usize {
        self.inner.state.read().store.len()
    }

    /// Whether a stream is currently being consumed
    pub fn is_processing(&self) -> bool {
        self.phase() == RunPhase::Streaming
    }

    pub fn phase(&self) -> RunPhase {
        self.inner.state.read().phase
    }

    pub fn current_run(&self) -> RunId {
        self.inner.state.read().run
    }

    /// Count of lines skipped as unparseable or malformed this run
    pub fn warnings(&self) -> u32 {
        self.inner.state.read().warnings
    }

    /// Source language detected by the service, once reported
    pub fn detected_language(&self) -> Option<String> {
        self.inner.state.read().detected_language.clone()
    }

    fn emit(&self, event: EngineEvent) {
        // send only fails when no subscriber is listening
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{ParseWarning, StreamDecoder};
    use crate::error::LineError;
    use crate::types::ControlStatus;

    fn engine() -> CaptionEngine {
        CaptionEngine::new(EngineConfig::default())
    }

    fn segment_outcome(start: f64, end: f64, text: &str) -> LineOutcome {
        LineOutcome::Event(StreamEvent::Segment(CaptionSegment {
            start,
            end,
            text: text.to_string(),
            translation: None,
        }))
    }

    #[test]
    fn test_run_lifecycle() {
        let engine = engine();
        assert_eq!(engine.phase(), RunPhase::Idle);
        assert!(!engine.is_processing());

        let run = engine.begin_run();
        assert_eq!(engine.phase(), RunPhase::Streaming);
        assert!(engine.is_processing());

        assert!(engine.apply(run, segment_outcome(0.0, 2.0, "hello")));
        assert!(engine.complete_run(run));
        assert_eq!(engine.phase(), RunPhase::Completed);
        assert_eq!(engine.segment_count(), 1);

        // Completed runs cannot complete or fail again
        assert!(!engine.complete_run(run));
        assert!(!engine.fail_run(run, &CaptionError::Status(reqwest::StatusCode::BAD_GATEWAY)));
    }

    #[test]
    fn test_stale_run_cannot_mutate() {
        let engine = engine();
        let old = engine.begin_run();
        engine.apply(old, segment_outcome(0.0, 2.0, "old"));

        let new = engine.begin_run();
        assert_eq!(engine.segment_count(), 0);

        // Late chunk from the abandoned run
        assert!(!engine.apply(old, segment_outcome(0.0, 2.0, "ghost")));
        assert!(!engine.complete_run(old));

        engine.apply(new, segment_outcome(5.0, 6.0, "new"));
        assert_eq!(engine.segments().len(), 1);
        assert_eq!(engine.segments()[0].text, "new");

        // No pre-reset segment is ever returned, for any time value
        for t in [0.0, 1.0, 2.0, 5.5] {
            if let Some(active) = engine.active_segment(t) {
                assert_eq!(active.text, "new");
            }
        }
    }

    #[test]
    fn test_failed_run_retains_segments() {
        let engine = engine();
        let run = engine.begin_run();
        engine.apply(run, segment_outcome(0.0, 2.0, "partial"));

        let err = CaptionError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(engine.fail_run(run, &err));
        assert_eq!(engine.phase(), RunPhase::Failed);

        // Partial captions remain displayable after failure
        assert_eq!(
            engine.active_segment(1.0).map(|s| s.text),
            Some("partial".to_string())
        );

        // ...but the dead run accepts nothing further
        assert!(!engine.apply(run, segment_outcome(2.0, 3.0, "late")));
    }

    #[test]
    fn test_warnings_are_counted_not_fatal() {
        let engine = engine();
        let run = engine.begin_run();

        engine.apply(
            run,
            LineOutcome::Warning(ParseWarning {
                line: "not json".to_string(),
                error: LineError::MalformedSegment("missing fields".to_string()),
            }),
        );
        engine.apply(run, segment_outcome(0.0, 1.0, "fine"));

        assert_eq!(engine.warnings(), 1);
        assert!(engine.is_processing());
        assert_eq!(engine.segment_count(), 1);
    }

    #[test]
    fn test_detected_language_recorded() {
        let engine = engine();
        let run = engine.begin_run();
        assert!(engine.detected_language().is_none());

        let mut decoder = StreamDecoder::new();
        for outcome in decoder.feed(b"{\"language\": \"en\", \"status\": \"processing\"}\n") {
            engine.apply(run, outcome);
        }
        assert_eq!(engine.detected_language().as_deref(), Some("en"));
        assert_eq!(engine.segment_count(), 0);
    }

    #[test]
    fn test_tick_emits_only_on_change() {
        let engine = engine();
        let mut events = engine.subscribe();
        let run = engine.begin_run();
        engine.apply(run, segment_outcome(0.0, 2.0, "A"));
        engine.apply(run, segment_outcome(5.0, 7.0, "B"));

        // Drain the run-start and segment-added notifications
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, EngineEvent::ActiveSegmentChanged { .. }));
        }

        assert_eq!(engine.tick(1.0).map(|s| s.text), Some("A".to_string()));
        match events.try_recv() {
            Ok(EngineEvent::ActiveSegmentChanged { active, .. }) => {
                assert_eq!(active.map(|s| s.text), Some("A".to_string()));
            }
            other => panic!("expected ActiveSegmentChanged, got {:?}", other),
        }

        // Same segment, no new notification
        engine.tick(1.5);
        assert!(events.try_recv().is_err());

        // Into the gap: change to none
        assert!(engine.tick(3.0).is_none());
        match events.try_recv() {
            Ok(EngineEvent::ActiveSegmentChanged { active, .. }) => assert!(active.is_none()),
            other => panic!("expected ActiveSegmentChanged, got {:?}", other),
        }
    }

    #[test]
    fn test_control_events_surface_to_subscribers() {
        let engine = engine();
        let mut events = engine.subscribe();
        let run = engine.begin_run();

        let mut decoder = StreamDecoder::new();
        for outcome in decoder.feed(b"{\"status\": \"completed\"}\n") {
            engine.apply(run, outcome);
        }

        let mut saw_control = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::ControlReceived { control, .. } = event {
                assert_eq!(control.status, ControlStatus::Completed);
                saw_control = true;
            }
        }
        assert!(saw_control);
    }

    #[test]
    fn test_active_query_is_pure() {
        let engine = engine();
        let run = engine.begin_run();
        engine.apply(run, segment_outcome(0.0, 3.0, "A"));

        let first = engine.active_segment(1.0);
        let second = engine.active_segment(1.0);
        assert_eq!(first, second);
        assert_eq!(engine.segment_count(), 1);
    }
}
