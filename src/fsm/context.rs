//! Mutable controller aggregate threaded through every state handler.
//!
//! `JackContext` owns the per-insertion accumulators, the deferred work
//! queue and the current time.  Hardware and the report sink travel
//! separately in [`Io`] so handlers can borrow both at once.

use embassy_time::Instant;
use heapless::Vec;
use log::info;

use crate::app::events::{HeadsetState, JackEvent};
use crate::app::ports::{JackHardware, ReportSink};
use crate::chip::{ChipCaps, ChipVariant, ImpedanceLevel};
use crate::config::JackConfig;
use crate::regs::{JD1_STS, MICD_CLAMP_STS};
use crate::work::WorkQueue;

use super::StateId;

/// HPDET results collected during accessory identification.
pub const MAX_HPDET_READINGS: usize = 3;

// ---------------------------------------------------------------------------
// Borrowed I/O
// ---------------------------------------------------------------------------

/// Hardware and report sink for the duration of one locked operation.
pub struct Io<'a> {
    pub hw: &'a mut dyn JackHardware,
    pub sink: &'a mut dyn ReportSink,
}

impl<'a> Io<'a> {
    pub fn new(hw: &'a mut dyn JackHardware, sink: &'a mut dyn ReportSink) -> Self {
        Self { hw, sink }
    }
}

// ---------------------------------------------------------------------------
// JackContext
// ---------------------------------------------------------------------------

pub struct JackContext {
    // -- Configuration --
    pub config: JackConfig,
    pub variant: ChipVariant,
    pub caps: ChipCaps,

    // -- Timing --
    /// Time of the operation currently running under the lock.
    pub now: Instant,
    pub work: WorkQueue,

    // -- State machine --
    pub active: Option<StateId>,
    /// Last masked jack status, for duplicate suppression.
    pub last_jackdet: u32,

    // -- Microphone identification --
    pub mic_mode_index: usize,
    pub jack_flips: u32,
    pub mic: bool,
    pub detecting: bool,

    // -- Accessory identification --
    pub readings: Vec<u32, MAX_HPDET_READINGS>,
    pub retried: bool,

    // -- Headphone --
    pub hp_impedance: u32,
    pub hp_imp_level: ImpedanceLevel,
    pub clamped: bool,
    /// OUT1L/OUT1R enables saved while the outputs are clamped.
    pub hp_ena: u32,

    // -- Reporting --
    pub headset: HeadsetState,
    /// Bit per configured range whose key is currently reported pressed.
    pub keys_down: u8,
    pub first_clear: bool,
}

impl JackContext {
    pub fn new(config: JackConfig, variant: ChipVariant, rev: u8) -> Self {
        Self {
            config,
            variant,
            caps: variant.caps(rev),
            now: Instant::from_ticks(0),
            work: WorkQueue::new(),
            active: None,
            last_jackdet: !(MICD_CLAMP_STS | JD1_STS),
            mic_mode_index: 0,
            jack_flips: 0,
            mic: false,
            detecting: false,
            readings: Vec::new(),
            retried: false,
            hp_impedance: 0,
            hp_imp_level: ImpedanceLevel::Normal,
            clamped: false,
            hp_ena: 0,
            headset: HeadsetState::NoHeadset,
            keys_down: 0,
            first_clear: false,
        }
    }

    /// Publish an accessory classification.
    pub fn report(&mut self, io: &mut Io<'_>, state: HeadsetState) {
        info!("Reporting {:?}", state);
        self.headset = state;
        io.sink.emit(&JackEvent::Switch(state));
    }

    /// Report every pressed key as released.  Returns whether anything was
    /// released.
    pub fn release_keys(&mut self, io: &mut Io<'_>) -> bool {
        if self.keys_down == 0 {
            return false;
        }
        for (i, range) in self.config.micd_ranges.iter().enumerate() {
            if self.keys_down & (1 << i) != 0 {
                io.sink.emit(&JackEvent::Key { code: range.key, pressed: false });
            }
        }
        self.keys_down = 0;
        true
    }

    pub fn press_key(&mut self, io: &mut Io<'_>, index: usize) {
        if let Some(range) = self.config.micd_ranges.get(index) {
            self.keys_down |= 1 << index;
            io.sink.emit(&JackEvent::Key { code: range.key, pressed: true });
        }
    }

    /// Forget everything measured for the current insertion.
    pub fn clear_accumulators(&mut self) {
        self.readings.clear();
        self.retried = false;
        self.mic = false;
        self.jack_flips = 0;
    }

    pub fn hpdet_state(&self) -> StateId {
        if self.config.hpdet_channel_right {
            StateId::HpdetRight
        } else {
            StateId::HpdetLeft
        }
    }
}
