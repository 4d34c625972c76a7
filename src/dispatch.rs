//! Interrupt handlers and deferred work bodies.
//!
//! Every function here runs with the controller lock held and receives
//! the context plus borrowed I/O.  Timing comes from `ctx.now`; nothing
//! sleeps.  Delays are expressed as [`WorkKind`] items and run later by the
//! reactor.

use embassy_time::Duration;
use log::{debug, error, info, warn};

use crate::app::events::{HeadsetState, JackEvent};
use crate::app::ports::RegisterPort;
use crate::config::JackConfig;
use crate::error::{Error, Result};
use crate::events::IrqLine;
use crate::fsm::states::tune;
use crate::fsm::{self, AccDetMode, Io, JackContext, StateId};
use crate::measure::{HP_Z_OPEN, Measurement, hpdet, micd};
use crate::regs::{
    AOD_IRQ_RAW_STATUS, AOD_WKUP_AND_TRIG, JACK_DETECT_DEBOUNCE, JACK_TRIG_STS_ALL, JD1_DB,
    JD1_STS, MICD_CLAMP_DB, MICD_CLAMP_STS,
};
use crate::work::WorkKind;

/// Settling time before accessory identification after insertion.
pub const HPDET_DEBOUNCE_MS: u64 = 500;

/// First mic input clear after a MICD event, then one follow-up.
const MICD_CLEAR_DELAY_MS: u64 = 80;
const MICD_CLEAR_FOLLOWUP_MS: u64 = 900;

fn schedule(ctx: &mut JackContext, kind: WorkKind, ms: u64) {
    let now = ctx.now;
    ctx.work.schedule(kind, now, Duration::from_millis(ms));
}

/// Status mask and the masked value meaning "jack present".
pub fn presence_bits(config: &JackConfig) -> (u32, u32) {
    if config.jd_gpio5 {
        let present = if config.jd_invert { MICD_CLAMP_STS } else { 0 };
        (MICD_CLAMP_STS, present)
    } else {
        let present = if config.jd_invert { 0 } else { JD1_STS };
        (JD1_STS, present)
    }
}

/// Route one interrupt line to its handler.
pub fn handle_irq(ctx: &mut JackContext, io: &mut Io<'_>, line: IrqLine) -> Result<()> {
    match line {
        IrqLine::JackDetect => jackdet(ctx, io),
        IrqLine::MicDetect => micdet(ctx, io),
        IrqLine::HpDetect => hpdet_irq(ctx, io),
    }
}

/// Run one due deferred work item.
pub fn run_work(ctx: &mut JackContext, io: &mut Io<'_>, kind: WorkKind) -> Result<()> {
    debug!("Running deferred {:?}", kind);
    match kind {
        WorkKind::StateTimeout => fsm::timeout_work(ctx, io),
        WorkKind::HpdetDebounce => hpdet_work(ctx, io),
        WorkKind::InitialDetect => initial_detect(ctx, io),
        WorkKind::MicdDetect => micd_detect_work(ctx, io),
        WorkKind::MicdClear => {
            micd_input_clear(ctx, io);
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Jack detect
// ═══════════════════════════════════════════════════════════════════════════

pub fn jackdet(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    let cancelled_hp = ctx.work.cancel(WorkKind::HpdetDebounce);
    let cancelled_state = ctx.work.cancel(WorkKind::StateTimeout);

    let (mask, present) = presence_bits(&ctx.config);

    let raw = match io.hw.read(AOD_IRQ_RAW_STATUS) {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to read jackdet status: {}", e);
            rearm(ctx, cancelled_hp, cancelled_state);
            return Err(e.into());
        }
    };

    let val = raw & mask;
    if val == ctx.last_jackdet {
        debug!("Suppressing duplicate JACKDET");
        rearm(ctx, cancelled_hp, cancelled_state);
    } else {
        ctx.last_jackdet = val;
        if val == present {
            insertion(ctx, io);
        } else {
            removal(ctx, io);
        }
    }

    // Clear trigger status so DCVDD is not held up.
    if let Err(e) = io.hw.write(AOD_WKUP_AND_TRIG, JACK_TRIG_STS_ALL) {
        warn!("Failed to clear jack trigger status: {}", e);
    }
    Ok(())
}

fn rearm(ctx: &mut JackContext, hpdet_work: bool, state_timeout: bool) {
    if hpdet_work {
        schedule(ctx, WorkKind::HpdetDebounce, HPDET_DEBOUNCE_MS);
    }
    if state_timeout {
        fsm::start_timeout(ctx);
    }
}

fn insertion(ctx: &mut JackContext, io: &mut Io<'_>) {
    info!("Detected jack");

    if ctx.config.hpdet_acc_id {
        schedule(ctx, WorkKind::HpdetDebounce, HPDET_DEBOUNCE_MS);
    } else {
        ctx.mic = false;
        ctx.jack_flips = 0;

        match ctx.config.init_mic_delay_ms {
            0 => {
                // Failures are logged by initial_detect; the jack still
                // counts as inserted.
                let _ = initial_detect(ctx, io);
            }
            ms => schedule(ctx, WorkKind::InitialDetect, u64::from(ms)),
        }
    }

    if let Err(e) = io
        .hw
        .update_bits(JACK_DETECT_DEBOUNCE, MICD_CLAMP_DB | JD1_DB, 0)
    {
        warn!("Failed to drop jack detect debounce: {}", e);
    }
}

fn removal(ctx: &mut JackContext, io: &mut Io<'_>) {
    info!("Detected jack removal");

    ctx.work.cancel_all();
    ctx.clear_accumulators();
    ctx.hp_impedance = 0;
    if let Err(e) = fsm::set_state(ctx, io, None) {
        warn!("Failed to stop detection: {}", e);
    }

    ctx.release_keys(io);
    io.sink.emit(&JackEvent::Sync);

    ctx.report(io, HeadsetState::NoHeadset);

    if let Err(e) = io.hw.update_bits(
        JACK_DETECT_DEBOUNCE,
        MICD_CLAMP_DB | JD1_DB,
        MICD_CLAMP_DB | JD1_DB,
    ) {
        warn!("Failed to restore jack detect debounce: {}", e);
    }

    tune(ctx, io, HP_Z_OPEN);

    io.sink.emit(&JackEvent::HpImpedance(HP_Z_OPEN));
    io.sink.emit(&JackEvent::MicPresence(false));
}

/// Enter the first detection state for a fresh insertion.
pub fn initial_detect(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    let first = match (ctx.config.custom_initial_state, ctx.config.hpdet_moisture_imp) {
        (Some(custom), _) => custom,
        (None, Some(_)) => StateId::HpdetMoisture,
        (None, None) => StateId::MicdMicrophone,
    };

    let entered = fsm::set_state(ctx, io, Some(first));
    fsm::start_timeout(ctx);
    entered.inspect_err(|e| warn!("Failed to start {}: {}", first.name(), e))
}

/// Deferred accessory identification.
pub fn hpdet_work(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    fsm::set_state(ctx, io, Some(StateId::HpdetAccId))
}

// ═══════════════════════════════════════════════════════════════════════════
//  Mic detect
// ═══════════════════════════════════════════════════════════════════════════

pub fn micdet(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    ctx.work.cancel(WorkKind::MicdDetect);
    ctx.work.cancel(WorkKind::MicdClear);

    let debounce = if ctx.detecting {
        ctx.config.micd_detect_debounce_ms
    } else {
        ctx.config.button_debounce_ms
    };

    if ctx.variant.needs_input_clear() {
        ctx.first_clear = true;
        schedule(ctx, WorkKind::MicdClear, MICD_CLEAR_DELAY_MS);
    }

    if debounce == 0 {
        return micd_detect_work(ctx, io);
    }
    schedule(ctx, WorkKind::MicdDetect, u64::from(debounce));
    Ok(())
}

/// Debounced MICD handling.
pub fn micd_detect_work(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    ctx.work.cancel(WorkKind::StateTimeout);

    if !ctx.active.map(StateId::mode).is_some_and(AccDetMode::is_micd) {
        warn!("Spurious MICDET IRQ");
        fsm::start_timeout(ctx);
        return Err(Error::Spurious("MICDET"));
    }

    let software = ctx.detecting && ctx.config.micd_software_compare;
    let result = match micd::read(&mut *io.hw, software) {
        Ok(Measurement::Ready(status)) => fsm::dispatch_reading(ctx, io, status),
        Ok(Measurement::Retry) => Ok(()),
        Err(e) => Err(e),
    };

    fsm::start_timeout(ctx);
    result
}

/// Clear latched mic input state, once more after a longer delay.
pub fn micd_input_clear(ctx: &mut JackContext, io: &mut Io<'_>) {
    if let Err(e) = io.hw.clear_input() {
        warn!("Failed to clear mic input: {}", e);
    }

    if ctx.first_clear {
        ctx.first_clear = false;
        schedule(ctx, WorkKind::MicdClear, MICD_CLEAR_FOLLOWUP_MS);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Headphone detect
// ═══════════════════════════════════════════════════════════════════════════

pub fn hpdet_irq(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    ctx.work.cancel(WorkKind::StateTimeout);

    if !ctx.active.map(StateId::mode).is_some_and(AccDetMode::is_hpdet) {
        warn!("Spurious HPDET IRQ");
        fsm::start_timeout(ctx);
        return Err(Error::Spurious("HPDET"));
    }

    let result = match hpdet::read(&mut *io.hw, ctx.caps.hpdet_ip, ctx.config.hpdet_ext_res) {
        Ok(Measurement::Ready(ohms)) => fsm::dispatch_reading(ctx, io, ohms),
        Ok(Measurement::Retry) => Ok(()),
        Err(e) => Err(e),
    };

    fsm::start_timeout(ctx);
    result
}
