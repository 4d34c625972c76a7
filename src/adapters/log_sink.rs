//! Log-based report sink adapter.
//!
//! Implements [`ReportSink`] by writing every [`JackEvent`] to the `log`
//! facade.  A switch-class or input-device adapter would implement the
//! same trait; this one is what the host build wires up, and its JSON
//! mode feeds tooling that scrapes the console.

use log::info;

use crate::app::events::JackEvent;
use crate::app::ports::ReportSink;
use crate::measure::HP_Z_OPEN;

/// Adapter that logs every [`JackEvent`].
#[derive(Debug, Default)]
pub struct LogReportSink {
    json: bool,
}

impl LogReportSink {
    pub fn new() -> Self {
        Self { json: false }
    }

    /// Emit one JSON object per event instead of the human readable form.
    pub fn json() -> Self {
        Self { json: true }
    }
}

impl ReportSink for LogReportSink {
    fn emit(&mut self, event: &JackEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => info!("EVENT | {}", line),
                Err(e) => info!("EVENT | unserialisable {:?}: {}", event, e),
            }
            return;
        }

        match event {
            JackEvent::Switch(state) => {
                info!("SWITCH | state={:?} ({})", state, *state as u8);
            }
            JackEvent::Key { code, pressed } => {
                info!(
                    "KEY | code=0x{:03x} {}",
                    code,
                    if *pressed { "DOWN" } else { "UP" }
                );
            }
            JackEvent::Sync => {
                info!("KEY | sync");
            }
            JackEvent::HpImpedance(ohms) if *ohms == HP_Z_OPEN => {
                info!("HPDET | impedance=open");
            }
            JackEvent::HpImpedance(ohms) => {
                info!("HPDET | impedance={}\u{03a9}", ohms);
            }
            JackEvent::MicPresence(mic) => {
                info!("MICD | mic={}", if *mic { "present" } else { "absent" });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::HeadsetState;

    #[test]
    fn events_serialise_for_json_mode() {
        let line = serde_json::to_string(&JackEvent::Switch(HeadsetState::Headset)).unwrap();
        assert_eq!(line, r#"{"Switch":"Headset"}"#);
        let line = serde_json::to_string(&JackEvent::Key { code: 0x100, pressed: true }).unwrap();
        assert_eq!(line, r#"{"Key":{"code":256,"pressed":true}}"#);
    }

    #[test]
    fn both_modes_accept_every_event() {
        for mut sink in [LogReportSink::new(), LogReportSink::json()] {
            sink.emit(&JackEvent::HpImpedance(HP_Z_OPEN));
            sink.emit(&JackEvent::MicPresence(true));
            sink.emit(&JackEvent::Sync);
        }
    }
}
