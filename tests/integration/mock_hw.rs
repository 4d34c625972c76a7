//! Test rig for integration tests.
//!
//! Wraps a probed [`JackDetector`] over the simulated codec with a manual
//! millisecond clock, so tests can plug accessories, raise interrupts and
//! step time without real hardware.

use embassy_time::Instant;
use jackdet::adapters::recorder::EventRecorder;
use jackdet::adapters::sim::{Accessory, SimCodec};
use jackdet::fsm::StateId;
use jackdet::{ChipVariant, HeadsetState, IrqLine, JackConfig, JackDetector, JackEvent};

/// Completions allowed for one headphone measurement, covering every
/// range step.
const MAX_HPDET_COMPLETIONS: usize = 8;

pub struct Rig {
    pub det: JackDetector<SimCodec, EventRecorder>,
    now_ms: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: JackConfig) -> Self {
        Self::with_codec(config, ChipVariant::Wm5110, 3, SimCodec::new())
    }

    pub fn with_codec(config: JackConfig, variant: ChipVariant, rev: u8, sim: SimCodec) -> Self {
        let det = JackDetector::probe(config, variant, rev, sim, EventRecorder::new())
            .expect("probe should accept the config");
        Self { det, now_ms: 0 }
    }

    pub fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms)
    }

    // ── Stimulus ──────────────────────────────────────────────

    /// Raise `line` and let the reactor run at the current time.
    pub fn irq(&mut self, line: IrqLine) {
        self.det.raise(line);
        self.det.service(self.now());
    }

    pub fn plug(&mut self, accessory: Accessory) {
        self.det.with_hardware(|hw| hw.plug(accessory));
        self.irq(IrqLine::JackDetect);
    }

    pub fn unplug(&mut self) {
        self.det.with_hardware(|hw| hw.unplug());
        self.irq(IrqLine::JackDetect);
    }

    pub fn press(&mut self, level: usize) {
        self.det.with_hardware(|hw| hw.press_button(level));
        self.irq(IrqLine::MicDetect);
    }

    pub fn release(&mut self) {
        self.det.with_hardware(|hw| hw.release_button());
        self.irq(IrqLine::MicDetect);
    }

    /// Complete HPDET measurements until the controller leaves `state`.
    pub fn finish_hpdet(&mut self, state: StateId) {
        for _ in 0..MAX_HPDET_COMPLETIONS {
            if self.det.active_state() != Some(state) {
                return;
            }
            self.det.with_hardware(|hw| hw.complete_hpdet());
            self.irq(IrqLine::HpDetect);
        }
        panic!("{:?} never settled", state);
    }

    /// Move the clock forward, running every deadline on the way.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        while let Some(deadline) = self.det.next_deadline() {
            let at = deadline.as_millis();
            if at > target {
                break;
            }
            self.now_ms = self.now_ms.max(at);
            self.det.service(self.now());
        }
        self.now_ms = target;
        self.det.service(self.now());
    }

    // ── Observation ───────────────────────────────────────────

    pub fn events(&self) -> Vec<JackEvent> {
        self.det.with_sink(|sink| sink.events().to_vec())
    }

    pub fn switch_states(&self) -> Vec<HeadsetState> {
        self.det.with_sink(|sink| sink.switch_states().collect())
    }

    pub fn clear_events(&mut self) {
        self.det.with_sink(|sink| sink.clear());
    }

    pub fn state(&self) -> Option<StateId> {
        self.det.active_state()
    }

    pub fn sim<T>(&self, f: impl FnOnce(&mut SimCodec) -> T) -> T {
        self.det.with_hardware(f)
    }
}

/// Insert a headset and drive detection to button mode.
#[allow(dead_code)]
pub fn headset_rig(config: JackConfig, hp_ohms: u32) -> Rig {
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headset(hp_ohms));
    rig.irq(IrqLine::MicDetect);
    rig.finish_hpdet(StateId::HpdetLeft);
    assert_eq!(rig.state(), Some(StateId::MicdButton));
    rig
}
