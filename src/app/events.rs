//! Events emitted by the controller through
//! [`ReportSink`](super::ports::ReportSink).

use serde::{Deserialize, Serialize};

// Linux input key codes for headset buttons.
pub const BTN_0: u16 = 0x100;
pub const BTN_1: u16 = 0x101;
pub const BTN_2: u16 = 0x102;
pub const BTN_3: u16 = 0x103;
pub const BTN_4: u16 = 0x104;
pub const BTN_5: u16 = 0x105;

/// Accessory classification, numbered as the h2w switch class expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HeadsetState {
    #[default]
    NoHeadset = 0,
    Headset = 1,
    HeadsetNoMic = 2,
}

/// Structured event for reporting adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JackEvent {
    /// Accessory classification changed.
    Switch(HeadsetState),
    /// Button state for one key code.
    Key { code: u16, pressed: bool },
    /// End of a batch of key events.
    Sync,
    /// Measured (or assumed) headphone impedance in ohms.
    HpImpedance(u32),
    /// Microphone identification result.
    MicPresence(bool),
}
