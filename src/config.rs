//! Jack detection configuration
//!
//! All tunable parameters for accessory detection.  Values come from board
//! description data (JSON on the host, baked-in tables on target) and are
//! validated once at probe; a rejected table never reaches runtime.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::app::events::{BTN_0, BTN_1, BTN_2, BTN_3, BTN_4, BTN_5};
use crate::error::ConfigError;
use crate::fsm::StateId;
use crate::measure::micd;

/// Comparator slots available for button thresholds.
pub const MAX_MICD_RANGE: usize = 8;

/// Storage for parsed range tables.  Larger than [`MAX_MICD_RANGE`] so an
/// oversize table is reported as such instead of as a parse failure.
const MICD_RANGE_STORAGE: usize = 16;

/// Maximum number of polarity/bias modes.
pub const MAX_MICD_MODES: usize = 4;

/// Short-circuit threshold used when none is configured.
pub const HP_SHORT_IMPEDANCE: u32 = 4;

/// Readings at or below this are treated as low impedance headphones.
pub const HP_LOW_IMPEDANCE_LIMIT: u32 = 13;

/// Default time to wait for a microphone before calling it headphones.
pub const DEFAULT_MICD_TIMEOUT_MS: u32 = 2000;

/// One button threshold: readings up to `max` ohms report `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicdRange {
    pub max: u16,
    pub key: u16,
}

/// One polarity/bias combination tried during microphone identification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicdConfig {
    /// Accessory detect source (ACCDET_SRC bit).
    pub src: bool,
    /// MICBIAS source, 0 = MICVDD, 1..=3 = MICBIASn.
    pub bias: u8,
    /// Level driven on the polarity line.
    pub gpio: bool,
}

/// Core jack detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JackConfig {
    // --- Buttons ---
    /// Button thresholds, ascending by `max`.
    pub micd_ranges: Vec<MicdRange, MICD_RANGE_STORAGE>,
    /// Polarity/bias modes cycled by the jack flip heuristic.
    pub micd_configs: Vec<MicdConfig, MAX_MICD_MODES>,

    // --- Timing ---
    /// MICD debounce while identifying a microphone (ms, 0 = inline).
    pub micd_detect_debounce_ms: u32,
    /// MICD debounce for button events (ms, 0 = inline).
    pub button_debounce_ms: u32,
    /// Microphone identification timeout (ms).
    pub micd_timeout_ms: u32,
    /// Delay between insertion and the first detection state (ms).
    pub init_mic_delay_ms: u32,

    // --- MICD hardware ---
    /// MICD_BIAS_STARTTIME field, 0 leaves the hardware default.
    pub micd_bias_start_time: u8,
    /// MICD_RATE field, 0 leaves the hardware default.
    pub micd_rate: u8,
    /// MICD_DBTIME field, 0 leaves the hardware default.
    pub micd_dbtime: u8,
    /// Classify the microphone from the raw ADC instead of the comparator.
    pub micd_software_compare: bool,
    /// Treat an open circuit microphone reading as a microphone.
    pub micd_open_circuit_declare: bool,
    /// Keep MICBIAS forced on after pulses.
    pub micd_force_micbias: bool,
    /// Keep MICBIAS forced on only during initial identification.
    pub micd_force_micbias_initial: bool,

    // --- Jack detect ---
    /// Use GPIO5 with the MICD clamp for jack detection.
    pub jd_gpio5: bool,
    /// Disable the GPIO5 pull-up.
    pub jd_gpio5_nopull: bool,
    /// Jack switch is active high.
    pub jd_invert: bool,
    /// General purpose switch mode, 0 leaves it untouched.
    pub gpsw: u8,

    // --- HPDET ---
    /// Identify accessories through HPDET before MICD.
    pub hpdet_acc_id: bool,
    /// Measure line outputs during identification instead of assuming 32 ohm.
    pub hpdet_acc_id_line: bool,
    /// Measure the right channel instead of the left.
    pub hpdet_channel_right: bool,
    /// Skip HPDET and report this impedance.
    pub fixed_hpdet_imp: Option<u32>,
    /// Readings at or above this on insertion are treated as moisture.
    pub hpdet_moisture_imp: Option<u32>,
    /// Readings at or below this are treated as a shorted output.
    pub hpdet_short_circuit_imp: u32,
    /// Series resistor to subtract from HPDET readings (ohms).
    pub hpdet_ext_res: u32,

    /// Board specific first state on insertion.
    pub custom_initial_state: Option<StateId>,
}

impl Default for JackConfig {
    fn default() -> Self {
        let mut micd_ranges = Vec::new();
        for (max, key) in [
            (11, BTN_0),
            (28, BTN_1),
            (54, BTN_2),
            (100, BTN_3),
            (186, BTN_4),
            (430, BTN_5),
        ] {
            let _ = micd_ranges.push(MicdRange { max, key });
        }

        let mut micd_configs = Vec::new();
        let _ = micd_configs.push(MicdConfig { src: true, bias: 1, gpio: false });
        let _ = micd_configs.push(MicdConfig { src: false, bias: 2, gpio: true });

        Self {
            micd_ranges,
            micd_configs,

            // Timing
            micd_detect_debounce_ms: 0,
            button_debounce_ms: 0,
            micd_timeout_ms: DEFAULT_MICD_TIMEOUT_MS,
            init_mic_delay_ms: 0,

            // MICD hardware
            micd_bias_start_time: 0,
            micd_rate: 0,
            micd_dbtime: 0,
            micd_software_compare: false,
            micd_open_circuit_declare: false,
            micd_force_micbias: false,
            micd_force_micbias_initial: false,

            // Jack detect
            jd_gpio5: false,
            jd_gpio5_nopull: false,
            jd_invert: false,
            gpsw: 0,

            // HPDET
            hpdet_acc_id: false,
            hpdet_acc_id_line: false,
            hpdet_channel_right: false,
            fixed_hpdet_imp: None,
            hpdet_moisture_imp: None,
            hpdet_short_circuit_imp: HP_SHORT_IMPEDANCE,
            hpdet_ext_res: 0,

            custom_initial_state: None,
        }
    }
}

impl JackConfig {
    /// Parse a JSON document and validate it.  Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tables the comparator cannot be programmed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.micd_configs.is_empty() {
            return Err(ConfigError::NoMicdModes);
        }
        if let Some(bad) = self.micd_configs.iter().find(|m| m.bias > 3) {
            return Err(ConfigError::InvalidBias(bad.bias));
        }
        if self.micd_ranges.len() > MAX_MICD_RANGE {
            return Err(ConfigError::TooManyRanges);
        }
        if self.micd_ranges.windows(2).any(|w| w[0].max > w[1].max) {
            return Err(ConfigError::UnsortedRanges);
        }
        if let Some(bad) = self
            .micd_ranges
            .iter()
            .find(|r| micd::level_index_for(r.max).is_none())
        {
            return Err(ConfigError::UnsupportedLevel(bad.max));
        }
        Ok(())
    }

    /// Short-circuit threshold clamped into `1..HP_LOW_IMPEDANCE_LIMIT`.
    pub fn short_circuit_imp(&self) -> u32 {
        match self.hpdet_short_circuit_imp {
            0 => HP_SHORT_IMPEDANCE,
            imp if imp >= HP_LOW_IMPEDANCE_LIMIT => HP_LOW_IMPEDANCE_LIMIT - 1,
            imp => imp,
        }
    }

    /// Number of polarity/bias modes.
    pub fn micd_num_modes(&self) -> usize {
        self.micd_configs.len()
    }

    /// Polarity/bias mode `index`, wrapped into range.
    pub fn micd_mode(&self, index: usize) -> MicdConfig {
        let modes = self.micd_configs.len().max(1);
        self.micd_configs.get(index % modes).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = JackConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.micd_ranges.len(), 6);
        assert_eq!(c.micd_num_modes(), 2);
        assert_eq!(c.micd_timeout_ms, DEFAULT_MICD_TIMEOUT_MS);
        assert!(c.short_circuit_imp() < HP_LOW_IMPEDANCE_LIMIT);
    }

    #[test]
    fn serde_roundtrip() {
        let mut c = JackConfig::default();
        c.fixed_hpdet_imp = Some(32);
        c.custom_initial_state = Some(StateId::HpdetMoisture);
        let json = serde_json::to_string(&c).unwrap();
        let c2: JackConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let c = JackConfig::from_json(r#"{ "micd_timeout_ms": 500, "jd_invert": true }"#).unwrap();
        assert_eq!(c.micd_timeout_ms, 500);
        assert!(c.jd_invert);
        assert_eq!(c.micd_ranges, JackConfig::default().micd_ranges);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert_eq!(JackConfig::from_json("{ not json"), Err(ConfigError::Parse));
    }

    #[test]
    fn unsorted_ranges_rejected() {
        let mut c = JackConfig::default();
        c.micd_ranges.swap(1, 2);
        assert_eq!(c.validate(), Err(ConfigError::UnsortedRanges));
    }

    #[test]
    fn equal_thresholds_are_allowed() {
        let mut c = JackConfig::default();
        c.micd_ranges[1].max = c.micd_ranges[0].max;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn too_many_ranges_rejected() {
        let mut c = JackConfig::default();
        for _ in 0..3 {
            c.micd_ranges.push(MicdRange { max: 1000, key: BTN_5 }).unwrap();
        }
        assert_eq!(c.micd_ranges.len(), 9);
        assert_eq!(c.validate(), Err(ConfigError::TooManyRanges));
    }

    #[test]
    fn threshold_above_level_table_rejected() {
        let mut c = JackConfig::default();
        c.micd_ranges.push(MicdRange { max: 2000, key: BTN_5 }).unwrap();
        assert_eq!(c.validate(), Err(ConfigError::UnsupportedLevel(2000)));
    }

    #[test]
    fn empty_modes_rejected() {
        let mut c = JackConfig::default();
        c.micd_configs.clear();
        assert_eq!(c.validate(), Err(ConfigError::NoMicdModes));
    }

    #[test]
    fn bias_out_of_range_rejected() {
        let mut c = JackConfig::default();
        c.micd_configs[0].bias = 4;
        assert_eq!(c.validate(), Err(ConfigError::InvalidBias(4)));
    }

    #[test]
    fn short_circuit_threshold_is_normalised() {
        let mut c = JackConfig::default();
        c.hpdet_short_circuit_imp = 0;
        assert_eq!(c.short_circuit_imp(), HP_SHORT_IMPEDANCE);
        c.hpdet_short_circuit_imp = 40;
        assert_eq!(c.short_circuit_imp(), HP_LOW_IMPEDANCE_LIMIT - 1);
        c.hpdet_short_circuit_imp = 7;
        assert_eq!(c.short_circuit_imp(), 7);
    }
}
