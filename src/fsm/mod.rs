//! Function-pointer detection state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  STATE_TABLE                                                     │
//! │  ┌────────────────┬──────┬────────┬──────────┬──────┬─────────┐  │
//! │  │ StateId        │ mode │ start  │ reading  │ stop │ timeout │  │
//! │  ├────────────────┼──────┼────────┼──────────┼──────┼─────────┤  │
//! │  │ HpdetLeft      │ HPL  │ fn     │ fn       │ fn   │    -    │  │
//! │  │ HpdetRight     │ HPR  │ fn     │ fn       │ fn   │    -    │  │
//! │  │ HpdetAccId     │ HPL  │ fn     │ fn       │ fn   │    -    │  │
//! │  │ HpdetMoisture  │ HPL  │ fn     │ fn       │ fn   │    -    │  │
//! │  │ MicdButton     │ MIC  │ fn     │ fn       │ fn   │    -    │  │
//! │  │ MicdMicrophone │ MIC  │ fn     │ fn       │ fn   │   fn    │  │
//! │  └────────────────┴──────┴────────┴──────────┴──────┴─────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one state is active.  The context only stores the active
//! [`StateId`]; descriptors are immutable and live in a static table.
//! Switching always stops the old state before starting the new one, and
//! a state whose start fails is never left active.

pub mod context;
pub mod states;

pub use context::{Io, JackContext};

use embassy_time::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::work::WorkKind;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every detection state.  Must stay in sync with [`states::STATE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateId {
    HpdetLeft = 0,
    HpdetRight = 1,
    HpdetAccId = 2,
    HpdetMoisture = 3,
    MicdButton = 4,
    MicdMicrophone = 5,
}

impl StateId {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::HpdetLeft,
        Self::HpdetRight,
        Self::HpdetAccId,
        Self::HpdetMoisture,
        Self::MicdButton,
        Self::MicdMicrophone,
    ];

    pub fn descriptor(self) -> &'static DetectionState {
        &states::STATE_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn mode(self) -> AccDetMode {
        self.descriptor().mode
    }
}

/// Accessory detect block mode (ACCDET_MODE field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AccDetMode {
    Mic = 0,
    Hpl = 1,
    Hpr = 2,
    Hpm = 4,
    Adc = 7,
}

impl AccDetMode {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn is_micd(self) -> bool {
        matches!(self, Self::Mic | Self::Adc)
    }

    pub fn is_hpdet(self) -> bool {
        matches!(self, Self::Hpl | Self::Hpr | Self::Hpm)
    }
}

// ---------------------------------------------------------------------------
// Handler signatures
// ---------------------------------------------------------------------------

/// Outcome of a reading handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Done,
    /// The state wants another measurement; its `restart` runs if present.
    Retry,
}

pub type StartFn = fn(&mut JackContext, &mut Io<'_>) -> Result<()>;
pub type ReadingFn = fn(&mut JackContext, &mut Io<'_>, u32) -> Result<Step>;
pub type StopFn = fn(&mut JackContext, &mut Io<'_>);
pub type TimeoutMsFn = fn(&JackContext) -> u32;

// ---------------------------------------------------------------------------
// Descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct DetectionState {
    pub id: StateId,
    pub name: &'static str,
    pub mode: AccDetMode,
    pub start: StartFn,
    pub reading: ReadingFn,
    pub stop: StopFn,
    pub restart: Option<StopFn>,
    pub timeout_ms: Option<TimeoutMsFn>,
    pub timeout: Option<StopFn>,
}

impl DetectionState {
    fn has_timeout(&self) -> bool {
        self.timeout_ms.is_some() && self.timeout.is_some()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Switch the active state.
///
/// A no-op when `new` is already active.  Otherwise the old state is
/// stopped, its pending timeout dropped, and `new` started.  If `start`
/// fails nothing is left active and the error is returned.
pub fn set_state(ctx: &mut JackContext, io: &mut Io<'_>, new: Option<StateId>) -> Result<()> {
    if new == ctx.active {
        return Ok(());
    }

    let old = ctx.active.take();
    if let Some(old) = old {
        (old.descriptor().stop)(ctx, io);
    }
    ctx.work.cancel(WorkKind::StateTimeout);

    info!("Detection transition: {} -> {}", state_name(old), state_name(new));

    ctx.active = new;
    let Some(id) = new else {
        return Ok(());
    };

    if let Err(e) = (id.descriptor().start)(ctx, io) {
        debug!("{} did not start: {}", id.name(), e);
        ctx.active = None;
        return Err(e);
    }

    start_timeout(ctx);
    Ok(())
}

/// Feed a measurement to the active state.
pub fn dispatch_reading(ctx: &mut JackContext, io: &mut Io<'_>, value: u32) -> Result<()> {
    let Some(id) = ctx.active else {
        warn!("Reading 0x{:x} with no active detection state", value);
        return Err(Error::Spurious("reading"));
    };

    match (id.descriptor().reading)(ctx, io, value) {
        Ok(Step::Done) => Ok(()),
        Ok(Step::Retry) => {
            // The reading handler may have switched state already.
            if let Some(restart) = ctx.active.and_then(|s| s.descriptor().restart) {
                restart(ctx, io);
            }
            Ok(())
        }
        Err(e) => {
            warn!("{} rejected reading: {}", id.name(), e);
            Err(e)
        }
    }
}

/// Arm the active state's timeout unless one is already pending.
pub fn start_timeout(ctx: &mut JackContext) {
    let Some(id) = ctx.active else {
        return;
    };
    let desc = id.descriptor();
    if !desc.has_timeout() {
        return;
    }
    if let Some(ms) = desc.timeout_ms.map(|f| f(ctx)) {
        let now = ctx.now;
        ctx.work
            .schedule(WorkKind::StateTimeout, now, Duration::from_millis(u64::from(ms)));
    }
}

/// Run the active state's timeout handler, then re-arm.
pub fn timeout_work(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    let Some(timeout) = ctx.active.and_then(|s| s.descriptor().timeout) else {
        warn!("State timeout with no timed state active");
        return Err(Error::Spurious("state timeout"));
    };
    timeout(ctx, io);
    start_timeout(ctx);
    Ok(())
}

fn state_name(id: Option<StateId>) -> &'static str {
    id.map_or("None", StateId::name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::SimCodec;
    use crate::adapters::recorder::EventRecorder;
    use crate::app::events::HeadsetState;
    use crate::chip::ChipVariant;
    use crate::config::JackConfig;
    use crate::regs::{ACCDET_MODE_MASK, ACCESSORY_DETECT_MODE_1, MIC_DETECT_1, MICD_ENA};
    use crate::app::ports::RegisterPort;
    use embassy_time::Instant;

    fn setup() -> (JackContext, SimCodec, EventRecorder) {
        let ctx = JackContext::new(JackConfig::default(), ChipVariant::Wm5110, 3);
        (ctx, SimCodec::new(), EventRecorder::new())
    }

    #[test]
    fn table_rows_match_ids() {
        for id in StateId::ALL {
            assert_eq!(id.descriptor().id, id);
        }
    }

    #[test]
    fn modes_follow_table() {
        assert_eq!(StateId::HpdetRight.mode(), AccDetMode::Hpr);
        assert_eq!(StateId::MicdButton.mode(), AccDetMode::Mic);
        assert!(StateId::HpdetMoisture.mode().is_hpdet());
        assert!(AccDetMode::Adc.is_micd());
    }

    #[test]
    fn entering_microphone_enables_micd_and_arms_timeout() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdMicrophone)).unwrap();

        assert_eq!(ctx.active, Some(StateId::MicdMicrophone));
        assert!(ctx.detecting);
        assert!(ctx.work.is_pending(WorkKind::StateTimeout));
        assert_eq!(hw.read(MIC_DETECT_1).unwrap() & MICD_ENA, MICD_ENA);
    }

    #[test]
    fn same_state_is_noop() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdButton)).unwrap();
        drop(io);
        let writes = hw.regs().write_count();

        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdButton)).unwrap();
        drop(io);
        assert_eq!(hw.regs().write_count(), writes);
    }

    #[test]
    fn switching_stops_old_state() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdMicrophone)).unwrap();
        set_state(&mut ctx, &mut io, Some(StateId::HpdetLeft)).unwrap();
        drop(io);

        assert!(!ctx.detecting);
        assert!(!ctx.work.is_pending(WorkKind::StateTimeout));
        assert_eq!(hw.read(MIC_DETECT_1).unwrap() & MICD_ENA, 0);
        assert_eq!(
            hw.read(ACCESSORY_DETECT_MODE_1).unwrap() & ACCDET_MODE_MASK,
            AccDetMode::Hpl.bits()
        );
    }

    #[test]
    fn failed_start_leaves_nothing_active() {
        let (mut ctx, mut hw, mut sink) = setup();
        hw.fail_writes_to(ACCESSORY_DETECT_MODE_1);
        let mut io = Io::new(&mut hw, &mut sink);
        assert!(set_state(&mut ctx, &mut io, Some(StateId::HpdetLeft)).is_err());
        assert_eq!(ctx.active, None);
    }

    #[test]
    fn reading_without_state_is_spurious() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        assert_eq!(
            dispatch_reading(&mut ctx, &mut io, 0),
            Err(Error::Spurious("reading"))
        );
    }

    #[test]
    fn timeout_without_state_is_spurious() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        assert!(matches!(timeout_work(&mut ctx, &mut io), Err(Error::Spurious(_))));
    }

    #[test]
    fn microphone_timeout_moves_to_hpdet() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdMicrophone)).unwrap();
        ctx.now = Instant::from_millis(2000);
        timeout_work(&mut ctx, &mut io).unwrap();
        assert_eq!(ctx.active, Some(StateId::HpdetLeft));
        assert!(!ctx.work.is_pending(WorkKind::StateTimeout));
    }

    #[test]
    fn start_timeout_keeps_pending_deadline() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdMicrophone)).unwrap();
        let first = ctx.work.deadline(WorkKind::StateTimeout);
        ctx.now = Instant::from_millis(500);
        start_timeout(&mut ctx);
        assert_eq!(ctx.work.deadline(WorkKind::StateTimeout), first);
    }

    #[test]
    fn clearing_state_does_not_report() {
        let (mut ctx, mut hw, mut sink) = setup();
        let mut io = Io::new(&mut hw, &mut sink);
        set_state(&mut ctx, &mut io, Some(StateId::MicdButton)).unwrap();
        set_state(&mut ctx, &mut io, None).unwrap();
        drop(io);
        assert_eq!(ctx.active, None);
        assert_eq!(ctx.headset, HeadsetState::NoHeadset);
        assert!(sink.is_empty());
    }
}
