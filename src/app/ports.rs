//! Port traits: the hexagonal boundary between detection logic and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ JackDetector (domain)
//! ```
//!
//! Driven adapters (register bus, supply, bias pins, GPIO lines, report
//! sinks) implement these traits.  The detection states only ever see
//! `&mut dyn JackHardware` and `&mut dyn ReportSink`, so the core never
//! touches a concrete peripheral.
//!
//! All hardware ports report failure as [`BusError`], distinct from a
//! zero/false reading.

use crate::error::BusError;

use super::events::JackEvent;

// ───────────────────────────────────────────────────────────────
// Register port (codec control interface)
// ───────────────────────────────────────────────────────────────

/// Read/write access to codec registers.
pub trait RegisterPort {
    fn read(&mut self, reg: u32) -> Result<u32, BusError>;

    fn write(&mut self, reg: u32, val: u32) -> Result<(), BusError>;

    /// Read-modify-write of `mask` bits.  Returns whether the register
    /// value changed; unchanged registers are not written.
    fn update_bits_check(&mut self, reg: u32, mask: u32, val: u32) -> Result<bool, BusError> {
        let old = self.read(reg)?;
        let new = (old & !mask) | (val & mask);
        if new == old {
            return Ok(false);
        }
        self.write(reg, new)?;
        Ok(true)
    }

    fn update_bits(&mut self, reg: u32, mask: u32, val: u32) -> Result<(), BusError> {
        self.update_bits_check(reg, mask, val).map(|_| ())
    }

    /// Clear latched mic input state after a MICD event (WM5110).
    fn clear_input(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Supply port (MICVDD regulator)
// ───────────────────────────────────────────────────────────────

/// MICVDD regulator.  Enables are reference counted by the implementation.
pub trait SupplyPort {
    fn supply_enable(&mut self) -> Result<(), BusError>;

    fn supply_disable(&mut self) -> Result<(), BusError>;

    /// Allow (or forbid) the regulator to run in bypass.
    fn allow_bypass(&mut self, bypass: bool) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Bias port (MICBIAS pins)
// ───────────────────────────────────────────────────────────────

/// Bias source selected by a [`MicdConfig`](crate::config::MicdConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicBias {
    MicVdd,
    MicBias1,
    MicBias2,
    MicBias3,
}

impl MicBias {
    /// Bias source for a MICD_BIAS_SRC field value.
    pub fn from_source(bias: u8) -> Self {
        match bias {
            1 => Self::MicBias1,
            2 => Self::MicBias2,
            3 => Self::MicBias3,
            _ => Self::MicVdd,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MicVdd => "MICVDD",
            Self::MicBias1 => "MICBIAS1",
            Self::MicBias2 => "MICBIAS2",
            Self::MicBias3 => "MICBIAS3",
        }
    }
}

/// Force-enable control of bias pins.
pub trait BiasPort {
    fn force_enable(&mut self, bias: MicBias) -> Result<(), BusError>;

    fn disable(&mut self, bias: MicBias) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Switch lines (polarity and accessory ID GPIOs)
// ───────────────────────────────────────────────────────────────

/// Optional GPIO lines around the jack.  Boards without a line accept the
/// request and do nothing.
pub trait SwitchLines {
    fn set_polarity_line(&mut self, high: bool) -> Result<(), BusError>;

    fn set_id_line(&mut self, high: bool) -> Result<(), BusError>;

    /// Whether an accessory ID line is fitted.
    fn has_id_line(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Combined hardware capability
// ───────────────────────────────────────────────────────────────

/// Everything the detection states need from the board.
pub trait JackHardware: RegisterPort + SupplyPort + BiasPort + SwitchLines {}

impl<T: RegisterPort + SupplyPort + BiasPort + SwitchLines> JackHardware for T {}

// ───────────────────────────────────────────────────────────────
// Report sink (driven adapter: domain → switch class / input events)
// ───────────────────────────────────────────────────────────────

/// The controller emits [`JackEvent`]s through this port.  Adapters decide
/// where they go (log, switch device, input subsystem, test recorder).
pub trait ReportSink {
    fn emit(&mut self, event: &JackEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::regmap::MemRegmap;

    #[test]
    fn update_bits_check_reports_change() {
        let mut regs = MemRegmap::new();
        regs.write(0x10, 0x0F).unwrap();
        assert!(regs.update_bits_check(0x10, 0x1, 0).unwrap());
        assert_eq!(regs.read(0x10).unwrap(), 0x0E);
        assert!(!regs.update_bits_check(0x10, 0x1, 0).unwrap());
    }

    #[test]
    fn update_bits_ignores_bits_outside_mask() {
        let mut regs = MemRegmap::new();
        regs.update_bits(0x20, 0x30, 0xFF).unwrap();
        assert_eq!(regs.read(0x20).unwrap(), 0x30);
    }

    #[test]
    fn bias_sources_map_to_pins() {
        assert_eq!(MicBias::from_source(0), MicBias::MicVdd);
        assert_eq!(MicBias::from_source(2).name(), "MICBIAS2");
    }
}
