//! Concrete detection states and the static table.
//!
//! ```text
//!  insertion ──▶ MOISTURE ──[dry]──▶ MICROPHONE ──[LVL_1..7]──▶ flip polarity
//!      │             │                  │   │                       │
//!      │          [wet]──▶ none         │ [timeout / LVL_0, LVL_8]◀─┘
//!      │                                ▼
//!      └──[acc id]──▶ ACC_ID ──▶    HPDET L/R ──[mic]──▶ BUTTON
//!                                       │
//!                                  [no mic]──▶ none
//! ```
//!
//! Handlers never block.  Hardware failures inside stop/cleanup paths are
//! logged and absorbed; failures that prevent a state from running are
//! returned from `start`.

use log::{debug, error, warn};

use crate::app::events::{HeadsetState, JackEvent};
use crate::app::ports::{BiasPort, MicBias, RegisterPort, SupplyPort, SwitchLines};
use crate::chip::tune_headphone;
use crate::config::DEFAULT_MICD_TIMEOUT_MS;
use crate::error::{BusError, Error, Result};
use crate::measure::{HPDET_MAX, micd};
use crate::regs::{
    ACCDET_MODE_MASK, ACCDET_SRC, ACCESSORY_DETECT_MODE_1, HEADPHONE_DETECT_1, HP_CTRL_1L,
    HP_CTRL_1R, HP_IMPEDANCE_RANGE_MASK, HP_POLL, MIC_DETECT_1, MICD_BIAS_SRC_MASK,
    MICD_BIAS_SRC_SHIFT, MICD_ENA, MICD_LVL_0_TO_7, MICD_LVL_1_TO_7, MICD_LVL_8, MICD_LVL_MASK,
    MICD_LVL_SHIFT, MICD_REVA_FIX, MICD_STS, OUT1L_ENA, OUT1R_ENA, OUTPUT_ENABLES_1, TEST_KEY,
};

use super::context::{Io, JackContext};
use super::{AccDetMode, DetectionState, StateId, Step, set_state};

/// Reading assumed for the first accessory ID step when line outputs are
/// not being identified.
const ACC_ID_ASSUMED_OHMS: u32 = 32;

/// Second accessory ID reading above this means a microphone is present.
const ACC_ID_MIC_MIN_OHMS: u32 = 50;

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

/// Indexed by `StateId as usize`.
pub static STATE_TABLE: [DetectionState; StateId::COUNT] = [
    DetectionState {
        id: StateId::HpdetLeft,
        name: "HpdetLeft",
        mode: AccDetMode::Hpl,
        start: hpdet_start,
        reading: hpdet_reading,
        stop: hpdet_stop,
        restart: None,
        timeout_ms: None,
        timeout: None,
    },
    DetectionState {
        id: StateId::HpdetRight,
        name: "HpdetRight",
        mode: AccDetMode::Hpr,
        start: hpdet_start,
        reading: hpdet_reading,
        stop: hpdet_stop,
        restart: None,
        timeout_ms: None,
        timeout: None,
    },
    DetectionState {
        id: StateId::HpdetAccId,
        name: "HpdetAccId",
        mode: AccDetMode::Hpl,
        start: acc_id_start,
        reading: acc_id_reading,
        stop: acc_id_stop,
        restart: Some(hpdet_restart),
        timeout_ms: None,
        timeout: None,
    },
    DetectionState {
        id: StateId::HpdetMoisture,
        name: "HpdetMoisture",
        mode: AccDetMode::Hpl,
        start: moisture_start,
        reading: moisture_reading,
        stop: hpdet_stop,
        restart: None,
        timeout_ms: None,
        timeout: None,
    },
    DetectionState {
        id: StateId::MicdButton,
        name: "MicdButton",
        mode: AccDetMode::Mic,
        start: micd_start,
        reading: button_reading,
        stop: micd_stop,
        restart: None,
        timeout_ms: None,
        timeout: None,
    },
    DetectionState {
        id: StateId::MicdMicrophone,
        name: "MicdMicrophone",
        mode: AccDetMode::Mic,
        start: mic_start,
        reading: mic_reading,
        stop: mic_stop,
        restart: None,
        timeout_ms: Some(mic_timeout_ms),
        timeout: Some(mic_timeout),
    },
];

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

fn active_mode(ctx: &JackContext, fallback: AccDetMode) -> AccDetMode {
    ctx.active.map_or(fallback, StateId::mode)
}

fn set_accdet_mode(io: &mut Io<'_>, mode: AccDetMode) -> core::result::Result<(), BusError> {
    io.hw
        .update_bits(ACCESSORY_DETECT_MODE_1, ACCDET_MODE_MASK, mode.bits())
}

/// ACCDET_SRC bit of the first polarity mode.
fn primary_src(ctx: &JackContext) -> u32 {
    if ctx.config.micd_mode(0).src { ACCDET_SRC } else { 0 }
}

fn micbias(ctx: &JackContext) -> MicBias {
    MicBias::from_source(ctx.config.micd_mode(0).bias)
}

pub(crate) fn tune(ctx: &mut JackContext, io: &mut Io<'_>, reading: u32) {
    let short = ctx.config.short_circuit_imp();
    tune_headphone(ctx.variant, &mut ctx.hp_imp_level, short, reading, &mut *io.hw);
}

/// Clamp (or release) the headphone outputs around an HPDET measurement.
///
/// Output enables are parked while clamped and only restored for loads
/// above the short-circuit threshold.
pub(crate) fn hp_clamp(ctx: &mut JackContext, io: &mut Io<'_>, clamp: bool) {
    let outputs = OUT1L_ENA | OUT1R_ENA;

    if clamp {
        if !ctx.clamped {
            match io.hw.read(OUTPUT_ENABLES_1) {
                Ok(v) => ctx.hp_ena = v & outputs,
                Err(e) => warn!("Failed to read headphone outputs: {}", e),
            }
        }
        if let Err(e) = io.hw.update_bits(OUTPUT_ENABLES_1, outputs, 0) {
            warn!("Failed to disable headphone outputs: {}", e);
        }
    }
    ctx.clamped = clamp;

    if let Some((mask, val)) = ctx.variant.hp_clamp_bits(clamp) {
        for reg in [HP_CTRL_1L, HP_CTRL_1R] {
            if let Err(e) = io.hw.update_bits(reg, mask, val) {
                warn!("Failed to do clamp: {}", e);
            }
        }
    }

    if !clamp && ctx.hp_impedance > ctx.config.short_circuit_imp() {
        if let Err(e) = io.hw.update_bits(OUTPUT_ENABLES_1, outputs, ctx.hp_ena) {
            warn!("Failed to restore headphone outputs: {}", e);
        }
    }
}

/// Select polarity/bias mode `index` (wrapped into range).
pub fn set_mode(ctx: &mut JackContext, io: &mut Io<'_>, index: usize) {
    let index = index % ctx.config.micd_num_modes().max(1);
    let mode = ctx.config.micd_mode(index);

    if let Err(e) = io.hw.set_polarity_line(mode.gpio) {
        warn!("Failed to drive polarity line: {}", e);
    }
    if let Err(e) = io.hw.update_bits(
        MIC_DETECT_1,
        MICD_BIAS_SRC_MASK,
        u32::from(mode.bias) << MICD_BIAS_SRC_SHIFT,
    ) {
        warn!("Failed to set MICD bias source: {}", e);
    }
    let src = if mode.src { ACCDET_SRC } else { 0 };
    if let Err(e) = io.hw.update_bits(ACCESSORY_DETECT_MODE_1, ACCDET_SRC, src) {
        warn!("Failed to set ACCDET source: {}", e);
    }

    ctx.mic_mode_index = index;
    debug!("Set jack polarity to {}", index);
}

fn pulse_micbias(ctx: &JackContext, io: &mut Io<'_>) {
    let bias = micbias(ctx);

    if let Err(e) = io.hw.force_enable(bias) {
        warn!("Failed to enable {}: {}", bias.name(), e);
    }

    if ctx.config.micd_force_micbias_initial && ctx.detecting {
        return;
    }

    if !ctx.config.micd_force_micbias {
        if let Err(e) = io.hw.disable(bias) {
            warn!("Failed to disable {}: {}", bias.name(), e);
        }
    }
}

/// Early WM5102 silicon needs a hidden register poked around MICD.
fn micd_reva_fixup(io: &mut Io<'_>, val: u32) {
    let result = io
        .hw
        .write(TEST_KEY, 0x3)
        .and_then(|()| io.hw.write(MICD_REVA_FIX, val))
        .and_then(|()| io.hw.write(TEST_KEY, 0x0));
    if let Err(e) = result {
        warn!("MICD rev A fixup failed: {}", e);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HPDET (left / right)
// ═══════════════════════════════════════════════════════════════════════════

fn hpdet_start(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    debug!("Starting HPDET");

    if let Some(imp) = ctx.config.fixed_hpdet_imp {
        io.sink.emit(&JackEvent::HpImpedance(imp));
        tune(ctx, io, imp);
        ctx.hp_impedance = imp;
        return Err(Error::FixedImpedance);
    }

    hp_clamp(ctx, io, true);

    let mode = active_mode(ctx, AccDetMode::Hpl);
    let started = set_accdet_mode(io, mode)
        .inspect_err(|e| error!("Failed to set HPDET mode ({:?}): {}", mode, e))
        .and_then(|()| {
            io.hw
                .update_bits(HEADPHONE_DETECT_1, HP_POLL, HP_POLL)
                .inspect_err(|e| error!("Can't start HPDET measurement: {}", e))
        });

    if let Err(e) = started {
        hp_clamp(ctx, io, false);
        return Err(e.into());
    }
    Ok(())
}

fn hpdet_restart(_ctx: &mut JackContext, io: &mut Io<'_>) {
    let result = io
        .hw
        .update_bits(HEADPHONE_DETECT_1, HP_IMPEDANCE_RANGE_MASK | HP_POLL, 0)
        .and_then(|()| io.hw.update_bits(HEADPHONE_DETECT_1, HP_POLL, HP_POLL));
    if let Err(e) = result {
        warn!("Failed to restart HPDET: {}", e);
    }
}

fn hpdet_stop(ctx: &mut JackContext, io: &mut Io<'_>) {
    if let Err(e) = io
        .hw
        .update_bits(HEADPHONE_DETECT_1, HP_IMPEDANCE_RANGE_MASK | HP_POLL, 0)
    {
        warn!("Failed to reset HPDET range: {}", e);
    }
    if let Err(e) = set_accdet_mode(io, AccDetMode::Mic) {
        warn!("Failed to reset ACCDET mode: {}", e);
    }
    hp_clamp(ctx, io, false);
}

fn hpdet_reading(ctx: &mut JackContext, io: &mut Io<'_>, ohms: u32) -> Result<Step> {
    ctx.hp_impedance = ohms;
    io.sink.emit(&JackEvent::HpImpedance(ohms));
    tune(ctx, io, ohms);

    if ctx.mic {
        ctx.report(io, HeadsetState::Headset);
        if let Err(e) = set_state(ctx, io, Some(StateId::MicdButton)) {
            warn!("Failed to start button detection: {}", e);
        }
    } else {
        ctx.report(io, HeadsetState::HeadsetNoMic);
        set_state(ctx, io, None)?;
    }
    Ok(Step::Done)
}

// ═══════════════════════════════════════════════════════════════════════════
//  HPDET moisture check
// ═══════════════════════════════════════════════════════════════════════════

fn moisture_start(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    let started = hpdet_start(ctx, io);
    hp_clamp(ctx, io, false);
    started
}

fn moisture_reading(ctx: &mut JackContext, io: &mut Io<'_>, ohms: u32) -> Result<Step> {
    let limit = ctx.config.hpdet_moisture_imp.unwrap_or(0);
    if ohms < limit {
        set_state(ctx, io, Some(StateId::MicdMicrophone))?;
    } else {
        warn!("Jack detection due to moisture, ignoring ({} ohms)", ohms);
        set_state(ctx, io, None)?;
    }
    Ok(Step::Done)
}

// ═══════════════════════════════════════════════════════════════════════════
//  HPDET accessory identification
// ═══════════════════════════════════════════════════════════════════════════

fn acc_id_start(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    debug!("Starting identification via HPDET");

    hp_clamp(ctx, io, true);

    let src = primary_src(ctx);
    let poll = ctx.config.hpdet_acc_id_line;
    let started = io
        .hw
        .update_bits(
            ACCESSORY_DETECT_MODE_1,
            ACCDET_SRC | ACCDET_MODE_MASK,
            src | AccDetMode::Hpl.bits(),
        )
        .inspect_err(|e| error!("Failed to set HPDETL mode: {}", e))
        .and_then(|()| {
            if !poll {
                return Ok(());
            }
            io.hw
                .update_bits(HEADPHONE_DETECT_1, HP_POLL, HP_POLL)
                .inspect_err(|e| error!("Can't start HPDETL measurement: {}", e))
        });

    if let Err(e) = started {
        hp_clamp(ctx, io, false);
        ctx.report(io, HeadsetState::HeadsetNoMic);
        return Err(e.into());
    }

    if !poll {
        let step = acc_id_reading(ctx, io, ACC_ID_ASSUMED_OHMS)?;
        if step == Step::Retry && ctx.active == Some(StateId::HpdetAccId) {
            hpdet_restart(ctx, io);
        }
    }
    Ok(())
}

fn acc_id_reading(ctx: &mut JackContext, io: &mut Io<'_>, ohms: u32) -> Result<Step> {
    if ctx.readings.push(ohms).is_err() {
        warn!("Discarding surplus HPDET reading {}", ohms);
        return Err(Error::InvalidReading("too many HPDET readings"));
    }

    let has_id_line = io.hw.has_id_line();
    let src = primary_src(ctx);

    // Only check the mic directly if it was not identified already.
    if has_id_line && ctx.readings.len() == 1 {
        debug!("Measuring mic");
        if let Err(e) = io.hw.update_bits(
            ACCESSORY_DETECT_MODE_1,
            ACCDET_SRC | ACCDET_MODE_MASK,
            src | AccDetMode::Hpr.bits(),
        ) {
            warn!("Failed to set HPDETR mode: {}", e);
        }
        if let Err(e) = io.hw.set_id_line(true) {
            warn!("Failed to raise ID line: {}", e);
        }
        return Ok(Step::Retry);
    }

    let headphone = ctx.readings.first().copied().unwrap_or(0);
    let mic = ctx.readings.get(1).copied().unwrap_or(0);
    debug!("HPDET measured {} {}", headphone, mic);

    // Slow insertion can produce a false open reading.
    if headphone >= HPDET_MAX && !ctx.retried {
        debug!("Retrying high impedance");
        ctx.readings.clear();
        ctx.retried = true;
        if let Err(e) = io.hw.update_bits(
            ACCESSORY_DETECT_MODE_1,
            ACCDET_SRC | ACCDET_MODE_MASK,
            src | AccDetMode::Hpl.bits(),
        ) {
            warn!("Failed to set HPDETL mode: {}", e);
        }
        return Ok(Step::Retry);
    }

    if !has_id_line || mic > ACC_ID_MIC_MIN_OHMS {
        debug!("Detected mic");
        set_state(ctx, io, Some(StateId::MicdMicrophone))?;
    } else {
        debug!("Detected headphone");
        ctx.report(io, HeadsetState::HeadsetNoMic);
        set_state(ctx, io, None)?;
    }
    Ok(Step::Done)
}

fn acc_id_stop(ctx: &mut JackContext, io: &mut Io<'_>) {
    let src = primary_src(ctx);
    if let Err(e) = io.hw.update_bits(ACCESSORY_DETECT_MODE_1, ACCDET_SRC, src) {
        warn!("Failed to restore ACCDET source: {}", e);
    }
    if io.hw.has_id_line() {
        if let Err(e) = io.hw.set_id_line(false) {
            warn!("Failed to lower ID line: {}", e);
        }
    }
    hpdet_stop(ctx, io);
}

// ═══════════════════════════════════════════════════════════════════════════
//  MICD (buttons)
// ═══════════════════════════════════════════════════════════════════════════

fn micd_start(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    if let Err(e) = io.hw.supply_enable() {
        error!("Failed to enable MICVDD: {}", e);
    }

    if ctx.caps.micd_reva {
        micd_reva_fixup(io, 0);
    }

    let mode = if ctx.detecting && ctx.config.micd_software_compare {
        AccDetMode::Adc
    } else {
        active_mode(ctx, AccDetMode::Mic)
    };
    if let Err(e) = set_accdet_mode(io, mode) {
        warn!("Failed to set MICD mode ({:?}): {}", mode, e);
    }

    pulse_micbias(ctx, io);

    if let Err(e) = io.hw.update_bits(MIC_DETECT_1, MICD_ENA, MICD_ENA) {
        error!("Failed to enable MICD: {}", e);
        if let Err(e) = io.hw.supply_disable() {
            warn!("Failed to disable MICVDD: {}", e);
        }
        return Err(e.into());
    }
    Ok(())
}

fn micd_stop(ctx: &mut JackContext, io: &mut Io<'_>) {
    if let Err(e) = io.hw.update_bits(MIC_DETECT_1, MICD_ENA, 0) {
        warn!("Failed to disable MICD: {}", e);
    }

    let bias = micbias(ctx);
    if let Err(e) = io.hw.disable(bias) {
        warn!("Failed to disable {}: {}", bias.name(), e);
    }

    if ctx.caps.micd_reva {
        micd_reva_fixup(io, 2);
    }

    if let Err(e) = set_accdet_mode(io, AccDetMode::Mic) {
        warn!("Failed to reset ACCDET mode: {}", e);
    }

    if let Err(e) = io.hw.supply_disable() {
        warn!("Failed to disable MICVDD: {}", e);
    }
}

fn button_reading(ctx: &mut JackContext, io: &mut Io<'_>, status: u32) -> Result<Step> {
    if status & MICD_LVL_0_TO_7 != 0 {
        debug!("Mic button detected");
        let released = ctx.release_keys(io);

        match micd::button_index_for_level(status, ctx.config.micd_ranges.len()) {
            Some(index) => {
                ctx.press_key(io, index);
                io.sink.emit(&JackEvent::Sync);
            }
            None => {
                warn!(
                    "Button level {} out of range",
                    (status & MICD_LVL_MASK) >> MICD_LVL_SHIFT
                );
                if released {
                    io.sink.emit(&JackEvent::Sync);
                }
            }
        }
    } else {
        debug!("Mic button released");
        ctx.release_keys(io);
        io.sink.emit(&JackEvent::Sync);
        pulse_micbias(ctx, io);
    }
    Ok(Step::Done)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MICD (microphone identification)
// ═══════════════════════════════════════════════════════════════════════════

fn mic_start(ctx: &mut JackContext, io: &mut Io<'_>) -> Result<()> {
    ctx.detecting = true;

    if let Err(e) = io.hw.allow_bypass(false) {
        error!("Failed to regulate MICVDD: {}", e);
    }

    let started = micd_start(ctx, io);
    if started.is_err() {
        ctx.detecting = false;
        if let Err(e) = io.hw.allow_bypass(true) {
            error!("Failed to bypass MICVDD: {}", e);
        }
    }
    started
}

fn mic_stop(ctx: &mut JackContext, io: &mut Io<'_>) {
    micd_stop(ctx, io);

    if let Err(e) = io.hw.allow_bypass(true) {
        error!("Failed to bypass MICVDD: {}", e);
    }

    ctx.detecting = false;
}

fn mic_reading(ctx: &mut JackContext, io: &mut Io<'_>, status: u32) -> Result<Step> {
    if status & MICD_STS == 0 {
        // Jack detect should make this impossible.
        warn!("Detected open circuit");
        ctx.mic = ctx.config.micd_open_circuit_declare;
    } else if status & MICD_LVL_8 != 0 {
        debug!("Detected headset");
        ctx.mic = true;
    } else if status & MICD_LVL_1_TO_7 != 0 {
        let modes = ctx.config.micd_num_modes();
        if ctx.jack_flips >= modes as u32 * 10 {
            debug!("Detected HP/line");
        } else {
            let next = (ctx.mic_mode_index + 1) % modes.max(1);
            set_mode(ctx, io, next);
            ctx.jack_flips += 1;
            return Ok(Step::Done);
        }
    } else {
        debug!("Headphone detected");
    }

    let hpdet = ctx.hpdet_state();
    if set_state(ctx, io, Some(hpdet)).is_err() {
        let state = if ctx.mic {
            HeadsetState::Headset
        } else {
            HeadsetState::HeadsetNoMic
        };
        ctx.report(io, state);
    }

    io.sink.emit(&JackEvent::MicPresence(ctx.mic));
    Ok(Step::Done)
}

fn mic_timeout_ms(ctx: &JackContext) -> u32 {
    match ctx.config.micd_timeout_ms {
        0 => DEFAULT_MICD_TIMEOUT_MS,
        ms => ms,
    }
}

fn mic_timeout(ctx: &mut JackContext, io: &mut Io<'_>) {
    debug!("MICD timed out, reporting HP");

    let hpdet = ctx.hpdet_state();
    if set_state(ctx, io, Some(hpdet)).is_err() {
        ctx.report(io, HeadsetState::HeadsetNoMic);
    }
}
