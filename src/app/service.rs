//! Application service: the hexagonal core.
//!
//! [`JackDetector`] owns the detection context, the hardware adapter and the
//! report sink behind one blocking mutex.  Every entry point (interrupt
//! handling, deferred work, queries, removal) takes that lock, so handlers
//! never observe each other half way through.
//!
//! ```text
//!  ISR ──raise──▶ IrqMailbox ─┐
//!                             ▼
//!  reactor ──service(now)──▶ ┌────────────────────────┐ ──▶ ReportSink
//!                            │      JackDetector      │
//!  JackHardware ◀────────────│ FSM · dispatch · work  │
//!                            └────────────────────────┘
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use log::{debug, info, warn};

use crate::app::events::HeadsetState;
use crate::chip::ChipVariant;
use crate::config::{JackConfig, MAX_MICD_RANGE};
use crate::dispatch;
use crate::error::{ConfigError, Error, Result};
use crate::events::{IrqLine, IrqMailbox};
use crate::fsm::states::set_mode;
use crate::fsm::{self, Io, JackContext, StateId};
use crate::measure::micd::{self, UNUSED_LEVEL};
use crate::regs::{
    GP_SWITCH_1, GPIO5_CTRL, GPIO5_JD_INPUT, GPN_PU, JACK_DETECT_ANALOGUE, JACK_DETECT_DEBOUNCE,
    JD1_DB, JD1_ENA, MIC_DETECT_1, MIC_DETECT_2, MICD_BIAS_STARTTIME_MASK,
    MICD_BIAS_STARTTIME_SHIFT, MICD_CLAMP_CONTROL, MICD_CLAMP_DB, MICD_CLAMP_MODE_JDH,
    MICD_CLAMP_MODE_JDH_GP5H, MICD_CLAMP_MODE_JDL, MICD_CLAMP_MODE_JDL_GP5H,
    MICD_CLAMP_MODE_MASK, MICD_DBTIME_MASK, MICD_DBTIME_SHIFT, MICD_LVL_SEL_MASK,
    MICD_RATE_MASK, MICD_RATE_SHIFT, SW1_MODE_MASK, micd_level_slot,
};

use super::ports::{JackHardware, RegisterPort, ReportSink, SupplyPort, SwitchLines};

/// All comparator levels disabled except the open and headset extremes.
const MICD_LVL_SEL_DEFAULT: u32 = 0x81;

/// Upper bound on work items run by one [`JackDetector::poll`].
const MAX_WORK_PER_POLL: usize = 16;

// ───────────────────────────────────────────────────────────────
// Locked aggregate
// ───────────────────────────────────────────────────────────────

struct Inner<H, S> {
    ctx: JackContext,
    hw: H,
    sink: S,
}

impl<H: JackHardware, S: ReportSink> Inner<H, S> {
    /// Borrow the context and I/O at once for a handler, at time `now`.
    fn run<T>(&mut self, now: Instant, f: impl FnOnce(&mut JackContext, &mut Io<'_>) -> T) -> T {
        if now > self.ctx.now {
            self.ctx.now = now;
        }
        let mut io = Io::new(&mut self.hw, &mut self.sink);
        f(&mut self.ctx, &mut io)
    }
}

// ───────────────────────────────────────────────────────────────
// JackDetector
// ───────────────────────────────────────────────────────────────

/// A probed jack detection controller.
pub struct JackDetector<H, S> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<H, S>>>,
    irqs: IrqMailbox,
}

impl<H: JackHardware, S: ReportSink> JackDetector<H, S> {
    /// Validate `config`, program the codec and arm jack detection.
    ///
    /// Nothing is reported until the first jack interrupt; boards that may
    /// boot with a jack inserted should [`raise`](Self::raise)
    /// [`IrqLine::JackDetect`] once after probe.
    pub fn probe(
        config: JackConfig,
        variant: ChipVariant,
        rev: u8,
        mut hw: H,
        mut sink: S,
    ) -> Result<Self> {
        config.validate().inspect_err(|e| warn!("Rejecting jack config: {}", e))?;

        let mut ctx = JackContext::new(config, variant, rev);
        info!(
            "Probing {:?} rev {} (HPDET IP {}, clamp {})",
            variant, rev, ctx.caps.hpdet_ip, ctx.caps.micd_clamp
        );

        program(&mut ctx, &mut hw, &mut sink)?;

        Ok(Self {
            inner: Mutex::new(RefCell::new(Inner { ctx, hw, sink })),
            irqs: IrqMailbox::new(),
        })
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner<H, S>) -> T) -> T {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    // ── Interrupt entry ───────────────────────────────────────

    /// Mark an interrupt pending.  Safe from interrupt context; the work
    /// happens in [`service`](Self::service).
    pub fn raise(&self, line: IrqLine) {
        self.irqs.raise(line);
    }

    /// Handle one interrupt immediately under the lock.
    pub fn handle_irq(&self, line: IrqLine, now: Instant) -> Result<()> {
        self.with_inner(|inner| {
            inner.run(now, |ctx, io| dispatch::handle_irq(ctx, io, line))
        })
        .inspect_err(|e| debug!("{:?} handler: {}", line, e))
    }

    // ── Reactor ───────────────────────────────────────────────

    /// Drain raised interrupts in priority order, then run due work.
    /// Handler errors are logged and absorbed.  Returns the work items run.
    pub fn service(&self, now: Instant) -> usize {
        while let Some(line) = self.irqs.take() {
            if let Err(e) = self.handle_irq(line, now) {
                warn!("{:?} not handled: {}", line, e);
            }
        }
        self.poll(now)
    }

    /// Run deferred work due at `now`, one item per lock acquisition.
    pub fn poll(&self, now: Instant) -> usize {
        let mut ran = 0;
        while ran < MAX_WORK_PER_POLL {
            let done = self.with_inner(|inner| {
                let kind = inner.ctx.work.take_due(now)?;
                let result = inner.run(now, |ctx, io| dispatch::run_work(ctx, io, kind));
                Some((kind, result))
            });
            match done {
                Some((kind, result)) => {
                    if let Err(e) = result {
                        warn!("Deferred {:?} failed: {}", kind, e);
                    }
                    ran += 1;
                }
                None => break,
            }
        }
        if ran == MAX_WORK_PER_POLL {
            debug!("Work budget exhausted, deferring the rest");
        }
        ran
    }

    /// Earliest pending deadline, for the reactor's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.with_inner(|inner| inner.ctx.work.next_deadline())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Last measured (or assumed) headphone impedance in ohms.
    pub fn hp_impedance(&self) -> u32 {
        self.with_inner(|inner| inner.ctx.hp_impedance)
    }

    pub fn headset_state(&self) -> HeadsetState {
        self.with_inner(|inner| inner.ctx.headset)
    }

    pub fn active_state(&self) -> Option<StateId> {
        self.with_inner(|inner| inner.ctx.active)
    }

    pub fn mic_present(&self) -> bool {
        self.with_inner(|inner| inner.ctx.mic)
    }

    /// Run `f` against the hardware adapter under the lock.
    pub fn with_hardware<T>(&self, f: impl FnOnce(&mut H) -> T) -> T {
        self.with_inner(|inner| f(&mut inner.hw))
    }

    /// Run `f` against the report sink under the lock.
    pub fn with_sink<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        self.with_inner(|inner| f(&mut inner.sink))
    }

    // ── Teardown ──────────────────────────────────────────────

    /// Stop detection and hand the hardware and sink back.
    ///
    /// Pending work is dropped before the active state is stopped, so no
    /// deferred item can run after this returns.
    pub fn remove(self) -> (H, S) {
        let Inner { mut ctx, mut hw, mut sink } = self.inner.into_inner().into_inner();

        ctx.work.cancel_all();
        {
            let mut io = Io::new(&mut hw, &mut sink);
            if let Err(e) = fsm::set_state(&mut ctx, &mut io, None) {
                warn!("Failed to stop detection: {}", e);
            }
        }

        if let Err(e) = hw.update_bits(MICD_CLAMP_CONTROL, MICD_CLAMP_MODE_MASK, 0) {
            warn!("Failed to disable MICD clamp: {}", e);
        }
        if let Err(e) = hw.update_bits(JACK_DETECT_ANALOGUE, JD1_ENA, 0) {
            warn!("Failed to disable jack detection: {}", e);
        }

        info!("Jack detection removed");
        (hw, sink)
    }
}

// ───────────────────────────────────────────────────────────────
// Probe programming
// ───────────────────────────────────────────────────────────────

fn program<H: JackHardware, S: ReportSink>(
    ctx: &mut JackContext,
    hw: &mut H,
    sink: &mut S,
) -> Result<()> {
    let config = &ctx.config;

    if config.gpsw > 0 {
        hw.update_bits(GP_SWITCH_1, SW1_MODE_MASK, u32::from(config.gpsw))?;
    }

    hw.set_polarity_line(config.micd_mode(0).gpio)?;
    if hw.has_id_line() {
        hw.set_id_line(false)?;
    }

    let fields = [
        (config.micd_bias_start_time, MICD_BIAS_STARTTIME_MASK, MICD_BIAS_STARTTIME_SHIFT),
        (config.micd_rate, MICD_RATE_MASK, MICD_RATE_SHIFT),
        (config.micd_dbtime, MICD_DBTIME_MASK, MICD_DBTIME_SHIFT),
    ];
    for (value, mask, shift) in fields {
        if value != 0 {
            hw.update_bits(MIC_DETECT_1, mask, u32::from(value) << shift)?;
        }
    }

    program_buttons(config, hw)?;

    if ctx.caps.micd_clamp {
        let clamp_mode = if config.jd_gpio5 {
            let mut val = GPIO5_JD_INPUT;
            if config.jd_gpio5_nopull {
                val &= !GPN_PU;
            }
            hw.write(GPIO5_CTRL, val)?;
            if config.jd_invert { MICD_CLAMP_MODE_JDH_GP5H } else { MICD_CLAMP_MODE_JDL_GP5H }
        } else if config.jd_invert {
            MICD_CLAMP_MODE_JDH
        } else {
            MICD_CLAMP_MODE_JDL
        };
        hw.update_bits(MICD_CLAMP_CONTROL, MICD_CLAMP_MODE_MASK, clamp_mode)?;
        hw.update_bits(JACK_DETECT_DEBOUNCE, MICD_CLAMP_DB, MICD_CLAMP_DB)?;
    }

    {
        let mut io = Io::new(&mut *hw, &mut *sink);
        set_mode(ctx, &mut io, 0);
    }

    hw.update_bits(JACK_DETECT_DEBOUNCE, JD1_DB, JD1_DB)?;
    hw.update_bits(JACK_DETECT_ANALOGUE, JD1_ENA, JD1_ENA)?;

    if let Err(e) = hw.allow_bypass(true) {
        warn!("Failed to set MICVDD to bypass: {}", e);
    }
    Ok(())
}

/// Program one comparator slot per configured range and park the rest.
fn program_buttons<R: RegisterPort + ?Sized>(config: &JackConfig, hw: &mut R) -> Result<()> {
    hw.update_bits(MIC_DETECT_2, MICD_LVL_SEL_MASK, MICD_LVL_SEL_DEFAULT)?;

    for (i, range) in config.micd_ranges.iter().enumerate() {
        let level = micd::level_index_for(range.max)
            .ok_or(Error::Config(ConfigError::UnsupportedLevel(range.max)))?;
        debug!(
            "{} ohms for MICD threshold {}",
            micd::MICD_LEVELS[level],
            i
        );
        set_level(hw, i, level)?;
        hw.update_bits(MIC_DETECT_2, 1 << i, 1 << i)?;
    }

    for i in config.micd_ranges.len()..MAX_MICD_RANGE {
        set_level(hw, i, UNUSED_LEVEL)?;
    }
    Ok(())
}

fn set_level<R: RegisterPort + ?Sized>(hw: &mut R, index: usize, level: usize) -> Result<()> {
    let (reg, mask, shift) = micd_level_slot(index);
    hw.update_bits(reg, mask, (level as u32) << shift)?;
    Ok(())
}
