use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::scheduler::{Event, Loop, MIN_LOOP_SECS};

struct RecordingSession {
    start: f64,
    events: Vec<Event>,
}

/// Flags shared by the audio callback, sensor ingestion and loop playback.
#[derive(Default)]
pub struct EngineState {
    enabled: AtomicBool,
    recording: Mutex<Option<RecordingSession>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.lock().is_some()
    }

    /// Open a recording at `now`. Returns false if one is already open.
    pub fn start_recording(&self, now: f64) -> bool {
        let mut rec = self.recording.lock();
        if rec.is_some() {
            return false;
        }
        *rec = Some(RecordingSession { start: now, events: Vec::new() });
        true
    }

    /// Append a note to the open recording, if any.
    pub fn record_event(&self, now: f64, note: u8) {
        if let Some(session) = self.recording.lock().as_mut() {
            session.events.push(Event { offset: (now - session.start).max(0.0), note });
        }
    }

    /// Close the recording. `None` if nothing was recording or no note was
    /// captured.
    pub fn stop_recording(&self, now: f64) -> Option<Loop> {
        let session = self.recording.lock().take()?;
        let duration = (now - session.start).max(MIN_LOOP_SECS);
        Loop::new(session.events, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_flag() {
        let state = EngineState::new();
        assert!(!state.is_enabled());
        state.set_enabled(true);
        assert!(state.is_enabled());
    }

    #[test]
    fn recording_captures_offsets() {
        let state = EngineState::new();
        state.record_event(1.0, 50);
        assert!(state.start_recording(10.0));
        assert!(!state.start_recording(11.0));
        state.record_event(10.5, 60);
        state.record_event(11.25, 64);
        let lp = state.stop_recording(12.0).unwrap();
        assert_eq!(lp.duration(), 2.0);
        assert_eq!(lp.events(), &[Event { offset: 0.5, note: 60 }, Event { offset: 1.25, note: 64 }]);
        assert!(!state.is_recording());
        assert!(state.stop_recording(13.0).is_none());
    }

    #[test]
    fn empty_recording_is_discarded() {
        let state = EngineState::new();
        state.start_recording(3.0);
        assert!(state.stop_recording(4.0).is_none());
        assert!(!state.is_recording());
    }

    #[test]
    fn short_recording_gets_minimum_length() {
        let state = EngineState::new();
        state.start_recording(3.0);
        state.record_event(3.0, 72);
        let lp = state.stop_recording(3.01).unwrap();
        assert_eq!(lp.duration(), MIN_LOOP_SECS);
    }
}
