//! Codec register addresses and bit fields used by jack detection.
//!
//! One shared map for the whole Arizona family; per-chip differences are
//! expressed through [`ChipCaps`](crate::chip::ChipCaps) rather than
//! separate register tables.

// ── Reva test registers ───────────────────────────────────────

pub const TEST_KEY: u32 = 0x80;
pub const MICD_REVA_FIX: u32 = 0x294;

// ── General purpose switch ────────────────────────────────────

pub const GP_SWITCH_1: u32 = 0x38;
pub const SW1_MODE_MASK: u32 = 0x3;

// ── MICVDD charge pump ────────────────────────────────────────

pub const MIC_CHARGE_PUMP_1: u32 = 0x200;
pub const CPMIC_BYPASS: u32 = 0x2;
pub const CPMIC_ENA: u32 = 0x1;

// ── MICBIAS control ───────────────────────────────────────────

pub const MIC_BIAS_CTRL_1: u32 = 0x218;
pub const MIC_BIAS_CTRL_2: u32 = 0x219;
pub const MIC_BIAS_CTRL_3: u32 = 0x21A;
pub const MICB_ENA: u32 = 0x1;

// ── Headphone output control ──────────────────────────────────

pub const HP_CTRL_1L: u32 = 0x225;
pub const HP_CTRL_1R: u32 = 0x226;
pub const RMV_SHRT_HP1L: u32 = 0x4000;
pub const HP1L_FLWR: u32 = 0x4;
pub const HP1L_SHRTI: u32 = 0x2;
pub const HP1L_SHRTO: u32 = 0x1;

pub const HP1_SHORT_CIRCUIT_CTRL: u32 = 0x4A0;
pub const HP1_SC_ENA: u32 = 0x1000;

pub const OUTPUT_ENABLES_1: u32 = 0x400;
pub const OUT1L_ENA: u32 = 0x2;
pub const OUT1R_ENA: u32 = 0x1;

// ── Accessory detect mode ─────────────────────────────────────

pub const ACCESSORY_DETECT_MODE_1: u32 = 0x293;
pub const ACCDET_SRC: u32 = 0x2000;
pub const ACCDET_MODE_MASK: u32 = 0x7;

// ── HPDET ─────────────────────────────────────────────────────

pub const HEADPHONE_DETECT_1: u32 = 0x29B;
pub const HP_IMPEDANCE_RANGE_MASK: u32 = 0x0600;
pub const HP_IMPEDANCE_RANGE_SHIFT: u32 = 9;
pub const HP_POLL: u32 = 0x1;

pub const HEADPHONE_DETECT_2: u32 = 0x29C;
pub const HP_DONE: u32 = 0x80;
pub const HP_LVL_MASK: u32 = 0x7F;
pub const HP_DONE_B: u32 = 0x8000;
pub const HP_LVL_B_MASK: u32 = 0x7FFF;

pub const HP_DACVAL: u32 = 0x29F;
pub const HP_DACVAL_MASK: u32 = 0x3FF;

// ── MICD ──────────────────────────────────────────────────────

pub const MICD_CLAMP_CONTROL: u32 = 0x2A2;
pub const MICD_CLAMP_MODE_MASK: u32 = 0xF;

pub const MIC_DETECT_1: u32 = 0x2A3;
pub const MICD_BIAS_STARTTIME_MASK: u32 = 0xF000;
pub const MICD_BIAS_STARTTIME_SHIFT: u32 = 12;
pub const MICD_RATE_MASK: u32 = 0x0F00;
pub const MICD_RATE_SHIFT: u32 = 8;
pub const MICD_BIAS_SRC_MASK: u32 = 0x0030;
pub const MICD_BIAS_SRC_SHIFT: u32 = 4;
pub const MICD_DBTIME_MASK: u32 = 0x0002;
pub const MICD_DBTIME_SHIFT: u32 = 1;
pub const MICD_ENA: u32 = 0x0001;

pub const MIC_DETECT_2: u32 = 0x2A4;
pub const MICD_LVL_SEL_MASK: u32 = 0xFF;

pub const MIC_DETECT_3: u32 = 0x2A5;
pub const MICD_LVL_MASK: u32 = 0x07FC;
pub const MICD_LVL_SHIFT: u32 = 2;
pub const MICD_VALID: u32 = 0x0002;
pub const MICD_STS: u32 = 0x0001;

/// Status bit for comparator level `n` (0..=8).
pub const fn micd_lvl(n: u32) -> u32 {
    1 << (n + MICD_LVL_SHIFT)
}

pub const MICD_LVL_0: u32 = micd_lvl(0);
pub const MICD_LVL_1: u32 = micd_lvl(1);
pub const MICD_LVL_8: u32 = micd_lvl(8);
pub const MICD_LVL_1_TO_7: u32 = 0x03F8;
pub const MICD_LVL_0_TO_7: u32 = 0x03FC;
pub const MICD_LVL_0_TO_8: u32 = 0x07FC;

pub const MIC_DETECT_LEVEL_1: u32 = 0x2A6;
pub const MIC_DETECT_LEVEL_4: u32 = 0x2A9;

pub const MIC_DETECT_4: u32 = 0x2AB;
pub const MICDET_ADCVAL_MASK: u32 = 0x7F;

// ── Jack detect ───────────────────────────────────────────────

pub const JACK_DETECT_ANALOGUE: u32 = 0x2D3;
pub const JD1_ENA: u32 = 0x1;

pub const GPIO5_CTRL: u32 = 0xC04;
pub const GPIO5_JD_INPUT: u32 = 0xC101;
pub const GPN_PU: u32 = 0x4000;

pub const AOD_WKUP_AND_TRIG: u32 = 0xD00;
pub const MICD_CLAMP_FALL_TRIG_STS: u32 = 0x80;
pub const MICD_CLAMP_RISE_TRIG_STS: u32 = 0x40;
pub const JD1_FALL_TRIG_STS: u32 = 0x2;
pub const JD1_RISE_TRIG_STS: u32 = 0x1;
pub const JACK_TRIG_STS_ALL: u32 =
    MICD_CLAMP_FALL_TRIG_STS | MICD_CLAMP_RISE_TRIG_STS | JD1_FALL_TRIG_STS | JD1_RISE_TRIG_STS;

pub const JACK_DETECT_DEBOUNCE: u32 = 0xD0E;
pub const MICD_CLAMP_DB: u32 = 0x10;
pub const JD1_DB: u32 = 0x1;

pub const AOD_IRQ_RAW_STATUS: u32 = 0xD0F;
pub const MICD_CLAMP_STS: u32 = 0x10;
pub const JD1_STS: u32 = 0x4;

// ── Clamp modes ───────────────────────────────────────────────

pub const MICD_CLAMP_MODE_JDL: u32 = 0x4;
pub const MICD_CLAMP_MODE_JDH: u32 = 0x5;
pub const MICD_CLAMP_MODE_JDL_GP5H: u32 = 0x9;
pub const MICD_CLAMP_MODE_JDH_GP5H: u32 = 0xB;

/// Level register and field mask for button comparator slot `index`.
///
/// Two slots share one register, even slots in the high byte.
pub const fn micd_level_slot(index: usize) -> (u32, u32, u32) {
    let reg = MIC_DETECT_LEVEL_4 - (index as u32 / 2);
    if index % 2 == 0 { (reg, 0x3F00, 8) } else { (reg, 0x3F, 0) }
}
