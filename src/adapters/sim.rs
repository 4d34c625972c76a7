//! Simulated codec for host builds and tests.
//!
//! `SimCodec` implements every hardware port over a [`MemRegmap`] and
//! models just enough of the jack to drive detection end to end: the jack
//! switch, the MICD comparator, HPDET completion for each IP revision,
//! the MICVDD refcount, forced bias pins and the two GPIO lines.
//!
//! Status registers are updated with [`MemRegmap::poke`] so they do not
//! show up in the driver write count.

use log::debug;

use crate::app::ports::{BiasPort, MicBias, RegisterPort, SupplyPort, SwitchLines};
use crate::error::BusError;
use crate::fsm::AccDetMode;
use crate::measure::hpdet::{B_RANGE_MAX, B_RANGES, C_RANGES};
use crate::regs::{
    ACCDET_MODE_MASK, ACCESSORY_DETECT_MODE_1, AOD_IRQ_RAW_STATUS, HEADPHONE_DETECT_1,
    HEADPHONE_DETECT_2, HP_DACVAL, HP_DONE, HP_DONE_B, HP_IMPEDANCE_RANGE_MASK,
    HP_IMPEDANCE_RANGE_SHIFT, HP_LVL_B_MASK, HP_LVL_MASK, HP_POLL, JD1_STS, MIC_DETECT_3,
    MIC_DETECT_4, MICD_CLAMP_STS, MICD_LVL_0, MICD_LVL_1, MICD_LVL_8, MICD_STS, MICD_VALID,
    micd_lvl,
};

use super::regmap::MemRegmap;

/// Microphone impedance seen on the ID line measurement.
const SIM_MIC_OHMS: u32 = 2200;

/// ADC codes reported in software-compare mode.
const ADC_CODE_MIC: u32 = 64;
const ADC_CODE_SHORT: u32 = 0;

/// What is plugged into the simulated jack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessory {
    /// Headphone load in ohms.
    pub hp_ohms: u32,
    /// A microphone is wired to the sleeve/ring.
    pub mic: bool,
    /// Ground and mic are swapped; the mic only reads correctly with the
    /// polarity line high.
    pub reversed: bool,
}

impl Accessory {
    pub const fn headphone(hp_ohms: u32) -> Self {
        Self { hp_ohms, mic: false, reversed: false }
    }

    pub const fn headset(hp_ohms: u32) -> Self {
        Self { hp_ohms, mic: true, reversed: false }
    }

    pub const fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimCodec {
    regs: MemRegmap,
    accessory: Option<Accessory>,
    button: Option<usize>,
    hpdet_ip: u8,

    polarity: bool,
    id_line: Option<bool>,
    supply_users: u32,
    bypass: bool,
    forced: [bool; 4],
    input_clears: u32,
}

impl Default for SimCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCodec {
    pub fn new() -> Self {
        Self {
            regs: MemRegmap::new(),
            accessory: None,
            button: None,
            hpdet_ip: 2,
            polarity: false,
            id_line: None,
            supply_users: 0,
            bypass: true,
            forced: [false; 4],
            input_clears: 0,
        }
    }

    /// Fit an accessory ID line.
    pub fn with_id_line(mut self) -> Self {
        self.id_line = Some(false);
        self
    }

    /// Emulate a different HPDET generation (defaults to 2).
    pub fn with_hpdet_ip(mut self, ip: u8) -> Self {
        self.hpdet_ip = ip;
        self
    }

    // ── Register access ───────────────────────────────────────

    pub fn regs(&self) -> &MemRegmap {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut MemRegmap {
        &mut self.regs
    }

    pub fn fail_reads_of(&mut self, reg: u32) {
        self.regs.fail_reads_of(reg);
    }

    pub fn fail_writes_to(&mut self, reg: u32) {
        self.regs.fail_writes_to(reg);
    }

    // ── Jack ──────────────────────────────────────────────────

    /// Drive the raw jack status.  Present sets JD1 and releases the MICD
    /// clamp.
    pub fn set_jack(&mut self, present: bool) {
        let raw = self.peek(AOD_IRQ_RAW_STATUS) & !(JD1_STS | MICD_CLAMP_STS);
        let raw = if present { raw | JD1_STS } else { raw | MICD_CLAMP_STS };
        self.regs.poke(AOD_IRQ_RAW_STATUS, raw);
    }

    pub fn plug(&mut self, accessory: Accessory) {
        debug!("SIM | plug {:?}", accessory);
        self.accessory = Some(accessory);
        self.button = None;
        self.set_jack(true);
        self.refresh_micd();
    }

    pub fn unplug(&mut self) {
        debug!("SIM | unplug");
        self.accessory = None;
        self.button = None;
        self.set_jack(false);
        self.refresh_micd();
    }

    pub fn accessory(&self) -> Option<Accessory> {
        self.accessory
    }

    // ── MICD ──────────────────────────────────────────────────

    /// Hold the button mapped to comparator level `level`.
    pub fn press_button(&mut self, level: usize) {
        self.button = Some(level);
        self.refresh_micd();
    }

    pub fn release_button(&mut self) {
        self.button = None;
        self.refresh_micd();
    }

    /// Comparator status for the current accessory, polarity and button.
    fn micd_status(&self) -> u32 {
        let Some(acc) = self.accessory else {
            return MICD_VALID;
        };
        let level = match self.button {
            Some(level) => micd_lvl(level as u32),
            None if !acc.mic => MICD_LVL_0,
            None if acc.reversed && !self.polarity => MICD_LVL_1,
            None => MICD_LVL_8,
        };
        MICD_VALID | MICD_STS | level
    }

    fn refresh_micd(&mut self) {
        let status = self.micd_status();
        self.regs.poke(MIC_DETECT_3, status);
        let mic = self.accessory.is_some_and(|a| a.mic && (!a.reversed || self.polarity));
        let code = if mic { ADC_CODE_MIC } else { ADC_CODE_SHORT };
        self.regs.poke(MIC_DETECT_4, code);
    }

    // ── HPDET ─────────────────────────────────────────────────

    /// Whether a headphone measurement has been started.
    pub fn hpdet_polling(&self) -> bool {
        self.peek(HEADPHONE_DETECT_1) & HP_POLL != 0
    }

    /// Finish the running measurement, latching the result for the current
    /// impedance range.
    pub fn complete_hpdet(&mut self) {
        let ohms = self.measured_ohms();
        let range = (self.peek(HEADPHONE_DETECT_1) & HP_IMPEDANCE_RANGE_MASK)
            >> HP_IMPEDANCE_RANGE_SHIFT;
        debug!("SIM | HPDET {} ohms, range {}", ohms, range);

        match self.hpdet_ip {
            0 => self.regs.poke(HEADPHONE_DETECT_2, HP_DONE | ohms.min(HP_LVL_MASK)),
            1 => {
                let b = B_RANGES[(range as usize).min(B_RANGES.len() - 1)];
                let dacval = ((b.factor_b / ohms.max(1) + b.factor_a) / 100).min(B_RANGE_MAX);
                self.regs.poke(HP_DACVAL, dacval);
                self.regs.poke(HEADPHONE_DETECT_2, HP_DONE_B);
            }
            _ => {
                let last = C_RANGES.len() - 1;
                let c = C_RANGES[(range as usize).min(last)];
                let seen = if (range as usize) < last { ohms.min(c.max) } else { ohms };
                let level = seen.saturating_mul(2).min(HP_LVL_B_MASK);
                self.regs.poke(HEADPHONE_DETECT_2, HP_DONE_B | level);
            }
        }
    }

    /// Load seen by HPDET: the microphone while the ID line is raised in
    /// right channel mode, otherwise the headphone.
    fn measured_ohms(&self) -> u32 {
        let Some(acc) = self.accessory else {
            return u32::MAX;
        };
        let mode = self.peek(ACCESSORY_DETECT_MODE_1) & ACCDET_MODE_MASK;
        if self.id_line == Some(true) && mode == AccDetMode::Hpr.bits() {
            return if acc.mic { SIM_MIC_OHMS } else { 0 };
        }
        acc.hp_ohms
    }

    // ── Observers ─────────────────────────────────────────────

    pub fn polarity_line(&self) -> bool {
        self.polarity
    }

    pub fn id_line(&self) -> bool {
        self.id_line.unwrap_or(false)
    }

    pub fn supply_users(&self) -> u32 {
        self.supply_users
    }

    pub fn bypass_allowed(&self) -> bool {
        self.bypass
    }

    pub fn bias_forced(&self, bias: MicBias) -> bool {
        self.forced[bias_slot(bias)]
    }

    pub fn input_clears(&self) -> u32 {
        self.input_clears
    }

    fn peek(&self, reg: u32) -> u32 {
        self.regs.peek(reg)
    }
}

fn bias_slot(bias: MicBias) -> usize {
    match bias {
        MicBias::MicVdd => 0,
        MicBias::MicBias1 => 1,
        MicBias::MicBias2 => 2,
        MicBias::MicBias3 => 3,
    }
}

// ── Port implementations ──────────────────────────────────────

impl RegisterPort for SimCodec {
    fn read(&mut self, reg: u32) -> Result<u32, BusError> {
        self.regs.read(reg)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<(), BusError> {
        self.regs.write(reg, val)
    }

    fn clear_input(&mut self) -> Result<(), BusError> {
        self.input_clears += 1;
        Ok(())
    }
}

impl SupplyPort for SimCodec {
    fn supply_enable(&mut self) -> Result<(), BusError> {
        self.supply_users += 1;
        Ok(())
    }

    fn supply_disable(&mut self) -> Result<(), BusError> {
        self.supply_users = self.supply_users.checked_sub(1).ok_or(BusError::Supply)?;
        Ok(())
    }

    fn allow_bypass(&mut self, bypass: bool) -> Result<(), BusError> {
        self.bypass = bypass;
        Ok(())
    }
}

impl BiasPort for SimCodec {
    fn force_enable(&mut self, bias: MicBias) -> Result<(), BusError> {
        self.forced[bias_slot(bias)] = true;
        Ok(())
    }

    fn disable(&mut self, bias: MicBias) -> Result<(), BusError> {
        self.forced[bias_slot(bias)] = false;
        Ok(())
    }
}

impl SwitchLines for SimCodec {
    fn set_polarity_line(&mut self, high: bool) -> Result<(), BusError> {
        self.polarity = high;
        self.refresh_micd();
        Ok(())
    }

    fn set_id_line(&mut self, high: bool) -> Result<(), BusError> {
        if let Some(line) = self.id_line.as_mut() {
            *line = high;
        }
        Ok(())
    }

    fn has_id_line(&self) -> bool {
        self.id_line.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{Measurement, hpdet, micd};

    fn start_hpdet(sim: &mut SimCodec) {
        sim.update_bits(HEADPHONE_DETECT_1, HP_POLL, HP_POLL).unwrap();
    }

    #[test]
    fn jack_switch_sets_jd1_and_clamp() {
        let mut sim = SimCodec::new();
        sim.set_jack(true);
        assert_eq!(sim.read(AOD_IRQ_RAW_STATUS).unwrap(), JD1_STS);
        sim.set_jack(false);
        assert_eq!(sim.read(AOD_IRQ_RAW_STATUS).unwrap(), MICD_CLAMP_STS);
        assert_eq!(sim.regs().write_count(), 0);
    }

    #[test]
    fn headset_reads_level_8_and_buttons_override() {
        let mut sim = SimCodec::new();
        sim.plug(Accessory::headset(32));
        assert_eq!(
            micd::read(&mut sim, false).unwrap(),
            Measurement::Ready(MICD_VALID | MICD_STS | MICD_LVL_8)
        );

        sim.press_button(2);
        assert_eq!(
            micd::read(&mut sim, false).unwrap(),
            Measurement::Ready(MICD_VALID | MICD_STS | micd_lvl(2))
        );
    }

    #[test]
    fn reversed_headset_needs_polarity_flip() {
        let mut sim = SimCodec::new();
        sim.plug(Accessory::headset(32).reversed());
        assert_eq!(sim.read(MIC_DETECT_3).unwrap() & MICD_LVL_1, MICD_LVL_1);
        sim.set_polarity_line(true).unwrap();
        assert_eq!(sim.read(MIC_DETECT_3).unwrap() & MICD_LVL_8, MICD_LVL_8);
    }

    #[test]
    fn software_compare_sees_microphone() {
        let mut sim = SimCodec::new();
        sim.plug(Accessory::headset(32));
        assert_eq!(
            micd::read(&mut sim, true).unwrap(),
            Measurement::Ready(MICD_STS | MICD_LVL_8)
        );
    }

    #[test]
    fn hpdet_ip2_steps_ranges_for_high_loads() {
        let mut sim = SimCodec::new();
        sim.plug(Accessory::headphone(600));
        start_hpdet(&mut sim);

        let mut result = Measurement::Retry;
        for _ in 0..C_RANGES.len() {
            sim.complete_hpdet();
            result = hpdet::read(&mut sim, 2, 0).unwrap();
            if result != Measurement::Retry {
                break;
            }
        }
        assert_eq!(result, Measurement::Ready(600));
    }

    #[test]
    fn hpdet_ip1_round_trips_through_dacval() {
        let mut sim = SimCodec::new().with_hpdet_ip(1);
        sim.plug(Accessory::headphone(32));
        start_hpdet(&mut sim);
        sim.complete_hpdet();
        match hpdet::read(&mut sim, 1, 0).unwrap() {
            Measurement::Ready(ohms) => assert!((31..=33).contains(&ohms), "{ohms}"),
            Measurement::Retry => panic!("measurement did not settle"),
        }
    }

    #[test]
    fn hpdet_ip0_reports_level_directly() {
        let mut sim = SimCodec::new().with_hpdet_ip(0);
        sim.plug(Accessory::headphone(16));
        sim.complete_hpdet();
        assert_eq!(hpdet::read(&mut sim, 0, 0).unwrap(), Measurement::Ready(16));
    }

    #[test]
    fn supply_refcount_rejects_underflow() {
        let mut sim = SimCodec::new();
        sim.supply_enable().unwrap();
        sim.supply_disable().unwrap();
        assert_eq!(sim.supply_disable(), Err(BusError::Supply));
    }

    #[test]
    fn id_line_is_ignored_when_not_fitted() {
        let mut sim = SimCodec::new();
        sim.set_id_line(true).unwrap();
        assert!(!sim.has_id_line());
        assert!(!sim.id_line());
    }
}
