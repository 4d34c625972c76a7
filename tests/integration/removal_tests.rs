//! Removal, duplicate suppression and fault absorption.

use jackdet::adapters::sim::Accessory;
use jackdet::app::events::BTN_3;
use jackdet::fsm::StateId;
use jackdet::measure::HP_Z_OPEN;
use jackdet::regs::AOD_IRQ_RAW_STATUS;
use jackdet::{HeadsetState, IrqLine, JackConfig, JackEvent};

use super::mock_hw::{Rig, headset_rig};

#[test]
fn removal_reports_no_headset_and_open_circuit() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.clear_events();

    rig.unplug();

    assert_eq!(
        rig.events(),
        vec![
            JackEvent::Sync,
            JackEvent::Switch(HeadsetState::NoHeadset),
            JackEvent::HpImpedance(HP_Z_OPEN),
            JackEvent::MicPresence(false),
        ]
    );
    assert_eq!(rig.state(), None);
    assert_eq!(rig.det.hp_impedance(), 0);
    assert_eq!(rig.sim(|hw| hw.supply_users()), 0);
}

#[test]
fn removal_releases_held_button() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.press(3);
    rig.clear_events();

    rig.unplug();

    let events = rig.events();
    assert_eq!(events[0], JackEvent::Key { code: BTN_3, pressed: false });
    assert_eq!(events[1], JackEvent::Sync);
}

#[test]
fn removal_during_hpdet_cancels_everything() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headset(32));
    rig.irq(IrqLine::MicDetect);
    assert_eq!(rig.state(), Some(StateId::HpdetLeft));
    assert!(rig.det.next_deadline().is_some());

    rig.unplug();

    assert_eq!(rig.state(), None);
    assert_eq!(rig.det.next_deadline(), None);
    assert_eq!(rig.switch_states(), vec![HeadsetState::NoHeadset]);

    // A late completion after removal is spurious and reports nothing.
    rig.clear_events();
    rig.sim(|hw| hw.complete_hpdet());
    rig.irq(IrqLine::HpDetect);
    assert!(rig.events().is_empty());
}

#[test]
fn removal_before_accessory_id_drops_debounce() {
    let mut config = JackConfig::default();
    config.hpdet_acc_id = true;
    let mut rig = Rig::new(config);
    rig.plug(Accessory::headset(32));
    rig.advance(100);
    rig.unplug();

    rig.advance(1000);
    assert_eq!(rig.state(), None);
    assert_eq!(rig.switch_states(), vec![HeadsetState::NoHeadset]);
}

#[test]
fn duplicate_jack_interrupts_report_once() {
    let mut rig = Rig::new(JackConfig::default());
    rig.plug(Accessory::headphone(16));
    rig.irq(IrqLine::JackDetect);
    rig.irq(IrqLine::JackDetect);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));

    rig.unplug();
    rig.irq(IrqLine::JackDetect);
    assert_eq!(rig.switch_states(), vec![HeadsetState::NoHeadset]);
}

#[test]
fn reinsertion_starts_fresh_detection() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.unplug();
    rig.clear_events();

    rig.plug(Accessory::headphone(16));
    rig.irq(IrqLine::MicDetect);
    rig.finish_hpdet(StateId::HpdetLeft);

    assert_eq!(rig.switch_states(), vec![HeadsetState::HeadsetNoMic]);
    assert!(!rig.det.mic_present());
}

#[test]
fn status_read_failure_is_absorbed() {
    let mut rig = Rig::new(JackConfig::default());
    rig.sim(|hw| hw.fail_reads_of(AOD_IRQ_RAW_STATUS));
    rig.plug(Accessory::headset(32));

    assert_eq!(rig.state(), None);
    assert!(rig.events().is_empty());

    rig.sim(|hw| hw.regs_mut().clear_faults());
    rig.irq(IrqLine::JackDetect);
    assert_eq!(rig.state(), Some(StateId::MicdMicrophone));
}

#[test]
fn spurious_micdet_without_jack_is_ignored() {
    let mut rig = Rig::new(JackConfig::default());
    rig.irq(IrqLine::MicDetect);
    rig.irq(IrqLine::HpDetect);
    assert!(rig.events().is_empty());
    assert_eq!(rig.state(), None);
}

#[test]
fn remove_hands_back_quiet_hardware() {
    let mut rig = headset_rig(JackConfig::default(), 32);
    rig.press(0);

    let (sim, sink) = rig.det.remove();
    assert_eq!(sim.supply_users(), 0);
    assert!(sim.bypass_allowed());
    assert_eq!(sink.last_switch(), Some(HeadsetState::Headset));
}
