//! Fuzz target: `hpdet::evaluate`
//!
//! Feeds arbitrary HEADPHONE_DETECT_2 / HP_DACVAL / range triples through
//! every IP revision and checks:
//! - No panics (no overflow or division by zero in the reciprocal maths)
//! - A range step always moves to the next range and never past the last
//! - Revision 2 readings settle inside the window of a non-final range
//!
//! cargo fuzz run fuzz_hpdet_snapshot

#![no_main]

use jackdet::measure::hpdet::{self, C_RANGES, HpdetOutcome, HpdetSnapshot};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }

    let ip = data[0] % 4;
    let status = u32::from(u16::from_le_bytes([data[1], data[2]]));
    let dacval = u32::from(u16::from_le_bytes([data[3], data[4]]));
    let range = u32::from_le_bytes([data[5], data[6], data[7], data[8]]) % 8;
    let ext_res = u32::from(data[9]);

    let snap = HpdetSnapshot { status, dacval, range };
    match hpdet::evaluate(ip, &snap) {
        HpdetOutcome::StepRange(next) => {
            assert!(next < hpdet::range_count(ip), "stepped past last range");
            assert!(next > range.min(hpdet::range_count(ip) - 1));
        }
        HpdetOutcome::Ohms(ohms) => {
            let last = C_RANGES.len() as u32 - 1;
            if ip >= 2 && range < last {
                assert!(ohms < C_RANGES[range as usize].max, "settled above range window");
            }
            let compensated = hpdet::compensate(ohms, ext_res);
            assert!(compensated <= ohms);
            assert!(compensated > 0 || ohms == 0);
        }
        HpdetOutcome::Retry | HpdetOutcome::OutOfRange => {}
    }
});
