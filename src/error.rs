//! Unified error types for the jack detection controller.
//!
//! A single `Error` enum that every layer converts into, so the dispatch
//! layer can log and absorb failures uniformly.  All variants are `Copy`
//! so they pass through state handlers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Register, supply, bias or GPIO access failed.
    Bus(BusError),
    /// Configuration was rejected at probe time.
    Config(ConfigError),
    /// Hardware returned a reading that cannot be interpreted.
    InvalidReading(&'static str),
    /// HPDET was skipped because a fixed impedance is configured.
    FixedImpedance,
    /// An interrupt or timeout fired with no matching active state.
    Spurious(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::InvalidReading(msg) => write!(f, "invalid reading: {msg}"),
            Self::FixedImpedance => write!(f, "fixed impedance configured"),
            Self::Spurious(what) => write!(f, "spurious {what}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Register read failed (register address attached).
    Read(u32),
    /// Register write failed (register address attached).
    Write(u32),
    /// A polarity or ID line could not be driven.
    Line,
    /// The MICVDD supply refused an enable/disable/bypass request.
    Supply,
    /// A MICBIAS pin could not be forced or released.
    Bias,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(reg) => write!(f, "read of 0x{reg:x} failed"),
            Self::Write(reg) => write!(f, "write of 0x{reg:x} failed"),
            Self::Line => write!(f, "GPIO line failed"),
            Self::Supply => write!(f, "MICVDD supply failed"),
            Self::Bias => write!(f, "MICBIAS control failed"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Reasons a [`JackConfig`](crate::config::JackConfig) fails validation.
/// These only ever surface from probe, never at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The polarity/bias mode list is empty.
    NoMicdModes,
    /// More button ranges than the comparator has slots.
    TooManyRanges,
    /// Button thresholds are not in non-decreasing order.
    UnsortedRanges,
    /// A threshold cannot be represented by the button level table.
    UnsupportedLevel(u16),
    /// A bias source outside MICVDD / MICBIAS1..3.
    InvalidBias(u8),
    /// The JSON document could not be parsed.
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMicdModes => write!(f, "no MICD modes configured"),
            Self::TooManyRanges => write!(f, "too many MICD ranges"),
            Self::UnsortedRanges => write!(f, "MICD ranges must be sorted"),
            Self::UnsupportedLevel(max) => write!(f, "unsupported MICD level {max}"),
            Self::InvalidBias(bias) => write!(f, "invalid MICD bias source {bias}"),
            Self::Parse => write!(f, "malformed config document"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
