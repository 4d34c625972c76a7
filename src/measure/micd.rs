//! Microphone detect interpretation.

use log::{debug, error, warn};

use crate::app::ports::RegisterPort;
use crate::config::MicdRange;
use crate::error::{Error, Result};
use crate::regs::{
    MIC_DETECT_1, MIC_DETECT_3, MIC_DETECT_4, MICD_ENA, MICD_LVL_0, MICD_LVL_0_TO_8,
    MICD_LVL_1, MICD_LVL_8, MICD_LVL_MASK, MICD_LVL_SHIFT, MICD_STS, MICD_VALID,
    MICDET_ADCVAL_MASK,
};

use super::Measurement;

/// Ohms for each MICD level / ADC code, ascending.  The final entry is the
/// open-circuit ceiling and is not usable as a button threshold.
pub const MICD_LEVELS: [u32; 65] = [
    3, 6, 8, 11, 13, 16, 18, 21, 23, 26, 28, 31, 34, 36, 39, 41, 44, 46, 49, 52, 54, 57, 60, 62,
    65, 67, 70, 73, 75, 78, 81, 83, 89, 94, 100, 105, 111, 116, 122, 127, 139, 150, 161, 173, 186,
    196, 209, 220, 245, 270, 295, 321, 348, 375, 402, 430, 489, 550, 614, 681, 752, 903, 1071,
    1257, 30000,
];

/// Levels usable as button thresholds.
pub const NUM_BUTTON_LEVELS: usize = 64;

/// Comparator level programmed into unused button slots.
pub const UNUSED_LEVEL: usize = 0x3F;

pub const QUICK_HEADPHONE_MAX_OHM: u32 = 3;
pub const MICROPHONE_MIN_OHM: u32 = 1257;
pub const MICROPHONE_MAX_OHM: u32 = 30000;

/// Hardware-compare polls before giving up.
const MICD_POLL_LIMIT: usize = 10;

/// Ohms for a raw ADC code; codes past the table are open circuit.
pub fn adc_to_ohms(code: u32) -> u32 {
    MICD_LEVELS.get(code as usize).copied().unwrap_or(u32::MAX)
}

/// Synthesize the comparator status word for a software-compare reading.
pub fn classify_ohms(ohms: u32) -> u32 {
    if ohms <= QUICK_HEADPHONE_MAX_OHM {
        MICD_STS | MICD_LVL_0
    } else if ohms <= MICROPHONE_MIN_OHM {
        MICD_STS | MICD_LVL_1
    } else if ohms <= MICROPHONE_MAX_OHM {
        MICD_STS | MICD_LVL_8
    } else {
        MICD_LVL_8
    }
}

/// First button level whose ohms reach `max`.
pub fn level_index_for(max: u16) -> Option<usize> {
    MICD_LEVELS[..NUM_BUTTON_LEVELS]
        .iter()
        .position(|&ohms| ohms >= u32::from(max))
}

/// Button range selected by a comparator status word: the lowest level bit
/// set, if it maps onto a configured range.
pub fn button_index_for_level(status: u32, num_ranges: usize) -> Option<usize> {
    let lvl = (status & MICD_LVL_MASK) >> MICD_LVL_SHIFT;
    if lvl == 0 {
        return None;
    }
    let index = lvl.trailing_zeros() as usize;
    (index < num_ranges).then_some(index)
}

/// Key for a button impedance, as the comparator would select it.
pub fn button_for_ohms(ranges: &[MicdRange], ohms: u32) -> Option<u16> {
    ranges
        .iter()
        .find(|r| ohms <= u32::from(r.max))
        .map(|r| r.key)
}

/// Sample microphone detect.
///
/// In software-compare mode MICD is paused around the ADC read and
/// restored to its previous enable state.  Otherwise the comparator status
/// is polled until a level bit appears.
pub fn read<R: RegisterPort + ?Sized>(regs: &mut R, software_compare: bool) -> Result<Measurement> {
    if software_compare {
        return read_adc(regs).map(Measurement::Ready);
    }

    let mut val = 0;
    for _ in 0..MICD_POLL_LIMIT {
        val = regs.read(MIC_DETECT_3).inspect_err(|e| {
            error!("Failed to read MICDET: {}", e);
        })?;
        debug!("MICDET: 0x{:x}", val);

        if val & MICD_VALID == 0 {
            warn!("Microphone detection state invalid");
            return Err(Error::InvalidReading("MICD state invalid"));
        }
        if val & MICD_LVL_0_TO_8 != 0 {
            return Ok(Measurement::Ready(val));
        }
    }

    error!("Failed to get valid MICDET value");
    Err(Error::InvalidReading("MICD level never settled"))
}

fn read_adc<R: RegisterPort + ?Sized>(regs: &mut R) -> Result<u32> {
    let was_enabled = regs
        .update_bits_check(MIC_DETECT_1, MICD_ENA, 0)
        .inspect_err(|e| error!("Failed to disable MICD: {}", e))?;

    let code = regs
        .read(MIC_DETECT_4)
        .inspect_err(|e| error!("Failed to read MICDET_ADCVAL: {}", e))?;
    debug!("MICDET_ADCVAL: 0x{:x}", code);

    let status = classify_ohms(adc_to_ohms(code & MICDET_ADCVAL_MASK));

    let restore = if was_enabled { MICD_ENA } else { 0 };
    regs.update_bits(MIC_DETECT_1, MICD_ENA, restore)
        .inspect_err(|e| error!("Failed to restore MICD: {}", e))?;

    Ok(status)
}
