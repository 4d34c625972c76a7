//! End-to-end detection flows: insertion through classification and
//! button reporting, driven by simulated interrupts.

use jackdet::adapters::sim::{Accessory, SimCodec};
use jackdet::app::events::{BTN_0, BTN_1};
use jackdet::fsm::StateId;
use jackdet::{ChipVariant, HeadsetState, IrqLine, JackConfig, JackEvent};

use super::mock_hw::{Rig, headset_rig};

// ── Headset ───────────────────────────────────────────────────

#[test]
fn headset_is_reported_with_impedance_and_mic() {
    let rig = headset_rig(JackConfig::default(), 32);

    let events = rig.events();
    assert_eq!(
        events,
        vec![
            JackEvent::MicPresence(true),
            JackEvent::HpImpedance(32),
            JackEvent::Switch(HeadsetState::Headset),
        ]
    );
    assert_eq!(rig.det.hp_impedance(), 32);
    assert!(rig.det.mic_present());
}

#[test]
fn button_press_and_release_report_keys() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.clear_events();

    rig.press(1);
    rig.release();

    assert_eq!(
        rig.events(),
        vec![
            JackEvent::Key { code: BTN_1, pressed: true },
            JackEvent::Sync,
            JackEvent::Key { code: BTN_1, pressed: false },
            JackEvent::Sync,
        ]
    );
    assert_eq!(rig.state(), Some(StateId::MicdButton));
}

#[test]
fn moving_between_buttons_releases_the_previous_key() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.clear_events();

    rig.press(0);
    rig.press(1);

    assert_eq!(
        rig.events(),
        vec![
            JackEvent::Key { code: BTN_0, pressed: true },
            JackEvent::Sync,
            JackEvent::Key { code: BTN_0, pressed: false },
            JackEvent::Key { code: BTN_1, pressed: true },
            JackEvent::Sync,
        ]
    );
}

#[test]
fn button_debounce_defers_handling() {
    let mut config = JackConfig::default();
    config.button_debounce_ms = 20;
    let mut rig = headset_rig(config, 32);
    rig.clear_events();

    rig.press(2);
    assert!(rig.events().is_empty());

    rig.advance(20);
    assert!(
        rig.events()
            .contains(&JackEvent::Key { code: jackdet::app::events::BTN_2, pressed: true })
    );
}

// ── Headphone ─────────────────────────────────────────────────

#[test]
fn headphone_is_reported_without_mic() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headphone(16));
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));

    rig.irq(IrqLine::MicDetect);
    assert_eq!(rig.state(), Some(StateId::HpdetLeft));
    rig.finish_hpdet(StateId::HpdetLeft);

    assert_eq!(rig.state(), None);
    assert_eq!(rig.switch_states(), vec![HeadsetState::HeadsetNoMic]);
    assert_eq!(rig.det.hp_impedance(), 16);
    assert!(!rig.det.mic_present());
    assert_eq!(rig.sim(|hw| hw.supply_users()), 0);
}

#[test]
fn microphone_timeout_falls_back_to_headphone() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headset(32));

    rig.advance(1999);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));
    rig.advance(1);
    assert_eq!(rig.state(), Some(StateId::HpdetLeft));

    rig.finish_hpdet(StateId::HpdetLeft);
    assert_eq!(rig.switch_states(), vec![HeadsetState::HeadsetNoMic]);
}

#[test]
fn right_channel_measurement_when_configured() {
    let mut config = JackConfig::default();
    config.hpdet_channel_right = true;
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headset(64));
    rig.irq(IrqLine::MicDetect);

    assert_eq!(rig.state(), Some(StateId::HpdetRight));
    rig.finish_hpdet(StateId::HpdetRight);
    assert_eq!(rig.det.hp_impedance(), 64);
    assert_eq!(rig.switch_states(), vec![HeadsetState::Headset]);
}

// ── Polarity ──────────────────────────────────────────────────

#[test]
fn reversed_headset_is_found_after_polarity_flip() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headset(32).reversed());

    rig.irq(IrqLine::MicDetect);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));
    assert!(rig.sim(|hw| hw.polarity_line()));

    rig.irq(IrqLine::MicDetect);
    rig.finish_hpdet(StateId::HpdetLeft);
    assert_eq!(rig.switch_states(), vec![HeadsetState::Headset]);
}

// ── Supplemented paths ────────────────────────────────────────

#[test]
fn fixed_impedance_skips_measurement() {
    let mut config = JackConfig::default();
    config.fixed_hpdet_imp = Some(40);
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headset(8));
    rig.irq(IrqLine::MicDetect);

    assert_eq!(rig.state(), None);
    assert_eq!(rig.det.hp_impedance(), 40);
    assert_eq!(rig.switch_states(), vec![HeadsetState::Headset]);
    assert!(!rig.sim(|hw| hw.hpdet_polling()));
}

#[test]
fn moisture_check_passes_dry_jack_to_mic_detection() {
    let mut config = JackConfig::default();
    config.hpdet_moisture_imp = Some(1000);
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headset(32));

    assert_eq!(rig.state(), Some(StateId::HpdetMoisture));
    rig.finish_hpdet(StateId::HpdetMoisture);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));
}

#[test]
fn moisture_check_ignores_wet_jack() {
    let mut config = JackConfig::default();
    config.hpdet_moisture_imp = Some(1000);
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headphone(5000));

    rig.finish_hpdet(StateId::HpdetMoisture);
    assert_eq!(rig.state(), None);
    assert!(rig.switch_states().is_empty());
}

#[test]
fn accessory_id_measures_mic_over_id_line() {
    let mut config = JackConfig::default();
    config.hpdet_acc_id = true;
    config.hpdet_acc_id_line = true;
    let mut rig = Rig::with_codec(config, ChipVariant::Wm5110, 3, SimCodec::new().with_id_line());
    rig.plug(Accessory::headset(32));
    assert_eq!(rig.state(), None);

    rig.advance(500);
    assert_eq!(rig.state(), Some(StateId::HpdetAccId));

    rig.finish_hpdet(StateId::HpdetAccId);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));
    assert!(!rig.sim(|hw| hw.id_line()));
}

#[test]
fn accessory_id_classifies_headphone_without_micd() {
    let mut config = JackConfig::default();
    config.hpdet_acc_id = true;
    config.hpdet_acc_id_line = true;
    let mut rig = Rig::with_codec(config, ChipVariant::Wm5110, 3, SimCodec::new().with_id_line());
    rig.plug(Accessory::headphone(32));

    rig.advance(500);
    rig.finish_hpdet(StateId::HpdetAccId);
    assert_eq!(rig.state(), None);
    assert_eq!(rig.switch_states(), vec![HeadsetState::HeadsetNoMic]);
}

#[test]
fn legacy_hpdet_chip_reports_headset() {
    let mut rig = Rig::with_codec(
        JackConfig::default(),
        ChipVariant::Wm5102,
        1,
        SimCodec::new().with_hpdet_ip(1),
    );
    rig.plug(Accessory::headset(32));
    rig.irq(IrqLine::MicDetect);
    rig.finish_hpdet(StateId::HpdetLeft);

    assert_eq!(rig.switch_states(), vec![HeadsetState::Headset]);
    let ohms = rig.det.hp_impedance();
    assert!((31..=33).contains(&ohms), "measured {ohms}");
}

#[test]
fn wm5110_clears_mic_input_after_micdet() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headset(32));
    rig.irq(IrqLine::MicDetect);

    rig.advance(80);
    assert_eq!(rig.sim(|hw| hw.input_clears()), 1);
    rig.advance(900);
    assert_eq!(rig.sim(|hw| hw.input_clears()), 2);
    rig.advance(2000);
    assert_eq!(rig.sim(|hw| hw.input_clears()), 2);
}
