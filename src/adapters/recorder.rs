//! Recording report sink.
//!
//! Keeps every emitted [`JackEvent`] in a bounded buffer.  Used by the
//! simulation harness and by tests to assert on what the controller
//! reported.

use heapless::Vec;
use log::warn;

use crate::app::events::{HeadsetState, JackEvent};
use crate::app::ports::ReportSink;

const RECORDER_CAP: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<JackEvent, RECORDER_CAP>,
    dropped: usize,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[JackEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }

    /// Events lost because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Switch states reported so far, in order.
    pub fn switch_states(&self) -> impl Iterator<Item = HeadsetState> + '_ {
        self.events.iter().filter_map(|e| match e {
            JackEvent::Switch(state) => Some(*state),
            _ => None,
        })
    }

    /// Most recent switch state, if any was reported.
    pub fn last_switch(&self) -> Option<HeadsetState> {
        self.switch_states().last()
    }
}

impl ReportSink for EventRecorder {
    fn emit(&mut self, event: &JackEvent) {
        if self.events.push(*event).is_err() {
            self.dropped += 1;
            warn!("Event recorder full, dropping {:?}", event);
        }
    }
}
