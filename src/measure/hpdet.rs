//! Headphone detect interpretation and range stepping.
//!
//! Three generations of HPDET hardware exist:
//!
//! | IP | Ranges | Conversion                          |
//! |----|--------|-------------------------------------|
//! | 0  | 1      | 7-bit level is ohms                 |
//! | 1  | 3      | `factor_b / (dacval*100 - factor_a)`|
//! | 2  | 4      | 15-bit level in half-ohm steps      |

use log::{debug, error, warn};

use crate::app::ports::RegisterPort;
use crate::error::Result;
use crate::regs::{
    HEADPHONE_DETECT_1, HEADPHONE_DETECT_2, HP_DACVAL, HP_DACVAL_MASK, HP_DONE, HP_DONE_B,
    HP_IMPEDANCE_RANGE_MASK, HP_IMPEDANCE_RANGE_SHIFT, HP_LVL_B_MASK, HP_LVL_MASK,
};

use super::{HPDET_MAX, Measurement};

/// Reciprocal conversion factors for IP revision 1.
#[derive(Debug, Clone, Copy)]
pub struct BRange {
    pub threshold: u32,
    pub factor_a: u32,
    pub factor_b: u32,
}

pub const B_RANGES: [BRange; 3] = [
    BRange { threshold: 100, factor_a: 5528, factor_b: 362_464 },
    BRange { threshold: 169, factor_a: 11084, factor_b: 6_186_851 },
    BRange { threshold: 169, factor_a: 11065, factor_b: 65_460_395 },
];

/// DAC values at or above this are out of range on IP revision 1.
pub const B_RANGE_MAX: u32 = 0x3FB;

/// Ohm window of each IP revision 2 range.
#[derive(Debug, Clone, Copy)]
pub struct CRange {
    pub min: u32,
    pub max: u32,
}

pub const C_RANGES: [CRange; 4] = [
    CRange { min: 0, max: 30 },
    CRange { min: 8, max: 100 },
    CRange { min: 100, max: 1000 },
    CRange { min: 1000, max: 10000 },
];

/// Raw register state needed to interpret one HPDET completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HpdetSnapshot {
    /// HEADPHONE_DETECT_2.
    pub status: u32,
    /// HP_DACVAL (IP revision 1 only).
    pub dacval: u32,
    /// Current impedance range index.
    pub range: u32,
}

/// What to do with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpdetOutcome {
    /// Measurement has not completed.
    Retry,
    /// Out of bounds for this range; program the next one and re-measure.
    StepRange(u32),
    /// Saturated at the last range; report without compensation.
    OutOfRange,
    /// Settled impedance before external resistor compensation.
    Ohms(u32),
}

/// Number of ranges for an IP revision.
pub fn range_count(ip: u8) -> u32 {
    match ip {
        0 => 1,
        1 => B_RANGES.len() as u32,
        _ => C_RANGES.len() as u32,
    }
}

/// Whether this revision needs HP_DACVAL read alongside the status.
pub fn needs_dacval(ip: u8) -> bool {
    ip == 1
}

/// Interpret a snapshot.  Unknown revisions use the revision 2 rules.
pub fn evaluate(ip: u8, snap: &HpdetSnapshot) -> HpdetOutcome {
    match ip {
        0 => {
            if snap.status & HP_DONE == 0 {
                return HpdetOutcome::Retry;
            }
            HpdetOutcome::Ohms(snap.status & HP_LVL_MASK)
        }
        1 => {
            if snap.status & HP_DONE_B == 0 {
                return HpdetOutcome::Retry;
            }
            let val = snap.dacval;
            let range = (snap.range as usize).min(B_RANGES.len() - 1);
            let b = B_RANGES[range];
            let out_of_bounds = val < b.threshold || val >= B_RANGE_MAX;
            if out_of_bounds && range < B_RANGES.len() - 1 {
                return HpdetOutcome::StepRange(range as u32 + 1);
            }
            if out_of_bounds {
                return HpdetOutcome::OutOfRange;
            }
            HpdetOutcome::Ohms(b.factor_b / (val * 100 - b.factor_a))
        }
        _ => {
            if snap.status & HP_DONE_B == 0 {
                return HpdetOutcome::Retry;
            }
            let val = (snap.status & HP_LVL_B_MASK) / 2;
            let range = (snap.range as usize).min(C_RANGES.len() - 1);
            let c = C_RANGES[range];
            if range < C_RANGES.len() - 1 && val >= c.max {
                return HpdetOutcome::StepRange(range as u32 + 1);
            }
            if range > 0 && val < c.min {
                return HpdetOutcome::Ohms(c.min);
            }
            HpdetOutcome::Ohms(val)
        }
    }
}

/// Subtract a series resistor, refusing to go to or below zero.
pub fn compensate(ohms: u32, ext_res: u32) -> u32 {
    if ext_res == 0 {
        return ohms;
    }
    if ext_res >= ohms {
        error!("External resistor ({}) >= measurement ({})", ext_res, ohms);
        return ohms;
    }
    debug!("Compensating for external {} ohm resistor", ext_res);
    ohms - ext_res
}

/// Sample HPDET, stepping the range register when needed.
pub fn read<R: RegisterPort + ?Sized>(regs: &mut R, ip: u8, ext_res: u32) -> Result<Measurement> {
    let status = regs
        .read(HEADPHONE_DETECT_2)
        .inspect_err(|e| error!("Failed to read HPDET status: {}", e))?;

    if ip > 2 {
        warn!("Unknown HPDET IP revision {}", ip);
    }

    let mut snap = HpdetSnapshot { status, ..HpdetSnapshot::default() };
    if ip != 0 {
        // Only the done bit matters until the measurement completes.
        if status & HP_DONE_B == 0 {
            error!("HPDET did not complete: {:x}", status);
            return Ok(Measurement::Retry);
        }
        if needs_dacval(ip) {
            match regs.read(HP_DACVAL) {
                Ok(v) => snap.dacval = v & HP_DACVAL_MASK,
                Err(e) => {
                    error!("Failed to read HP value: {}", e);
                    return Ok(Measurement::Retry);
                }
            }
        }
        let hp1 = regs.read(HEADPHONE_DETECT_1)?;
        snap.range = (hp1 & HP_IMPEDANCE_RANGE_MASK) >> HP_IMPEDANCE_RANGE_SHIFT;
    }

    match evaluate(ip, &snap) {
        HpdetOutcome::Retry => {
            error!("HPDET did not complete: {:x}", status);
            Ok(Measurement::Retry)
        }
        HpdetOutcome::StepRange(range) => {
            debug!("Moving to HPDET range {}", range);
            regs.update_bits(
                HEADPHONE_DETECT_1,
                HP_IMPEDANCE_RANGE_MASK,
                range << HP_IMPEDANCE_RANGE_SHIFT,
            )?;
            Ok(Measurement::Retry)
        }
        HpdetOutcome::OutOfRange => {
            debug!("Measurement out of range");
            Ok(Measurement::Ready(HPDET_MAX))
        }
        HpdetOutcome::Ohms(ohms) => {
            let ohms = compensate(ohms, ext_res);
            debug!("HP impedance {} ohms", ohms);
            Ok(Measurement::Ready(ohms))
        }
    }
}
