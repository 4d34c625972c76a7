//! Fuzz target: `JackDetector` interrupt handling
//!
//! Interprets each input byte as one stimulus (jack edge, interrupt line,
//! HPDET completion, button level, clock step) against the simulated codec
//! and checks:
//! - No panics under any interleaving
//! - MICVDD is never requested more than once
//! - A final removal always leaves nothing scheduled
//!
//! cargo fuzz run fuzz_irq_sequence

#![no_main]

use embassy_time::Instant;
use jackdet::adapters::recorder::EventRecorder;
use jackdet::adapters::sim::{Accessory, SimCodec};
use jackdet::{ChipVariant, IrqLine, JackConfig, JackDetector};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&flags, ops)) = data.split_first() else {
        return;
    };

    let mut config = JackConfig::default();
    config.hpdet_acc_id = flags & 0x01 != 0;
    config.hpdet_channel_right = flags & 0x02 != 0;
    config.micd_software_compare = flags & 0x04 != 0;
    if flags & 0x08 != 0 {
        config.hpdet_moisture_imp = Some(1000);
    }
    let variant = if flags & 0x10 != 0 { ChipVariant::Wm5102 } else { ChipVariant::Wm5110 };
    let sim = SimCodec::new().with_hpdet_ip(if flags & 0x10 != 0 { 1 } else { 2 });

    let Ok(det) = JackDetector::probe(config, variant, 3, sim, EventRecorder::new()) else {
        return;
    };

    let mut now_ms = 0u64;
    for &op in ops.iter().take(256) {
        let arg = op >> 3;
        match op & 0x07 {
            0 => {
                let ohms = u32::from(arg) * 50 + 1;
                let acc = if arg & 1 != 0 { Accessory::headset(ohms) } else { Accessory::headphone(ohms) };
                det.with_hardware(|hw| hw.plug(acc));
                det.raise(IrqLine::JackDetect);
            }
            1 => {
                det.with_hardware(|hw| hw.unplug());
                det.raise(IrqLine::JackDetect);
            }
            2 => det.raise(IrqLine::MicDetect),
            3 => {
                det.with_hardware(|hw| hw.complete_hpdet());
                det.raise(IrqLine::HpDetect);
            }
            4 => {
                det.with_hardware(|hw| hw.press_button(usize::from(arg % 8)));
                det.raise(IrqLine::MicDetect);
            }
            5 => {
                det.with_hardware(|hw| hw.release_button());
                det.raise(IrqLine::MicDetect);
            }
            _ => now_ms += u64::from(arg) * 20,
        }
        det.service(Instant::from_millis(now_ms));
        assert!(det.with_hardware(|hw| hw.supply_users()) <= 1);
    }

    det.with_hardware(|hw| hw.plug(Accessory::headphone(32)));
    det.raise(IrqLine::JackDetect);
    det.service(Instant::from_millis(now_ms));
    det.with_hardware(|hw| hw.unplug());
    det.raise(IrqLine::JackDetect);
    det.service(Instant::from_millis(now_ms));

    assert_eq!(det.active_state(), None);
    assert_eq!(det.next_deadline(), None);
});
