//! Measurement primitives.
//!
//! Interpretation of MICD and HPDET register snapshots.  The pure halves
//! (`classify_*`, `evaluate`) never touch hardware; the `read` wrappers
//! sample registers through [`RegisterPort`](crate::app::ports::RegisterPort)
//! and apply range stepping.
//!
//! ```text
//!   registers ──▶ read() ──▶ Measurement::Ready(value) ──▶ dispatch_reading
//!                   │
//!                   └──────▶ Measurement::Retry   (hardware not settled,
//!                                                  or range was stepped)
//! ```

pub mod hpdet;
pub mod micd;

/// Result of sampling detection hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// A settled value: MICD status word or HPDET ohms.
    Ready(u32),
    /// Not settled yet, or moved to another range; wait for the next IRQ.
    Retry,
}

/// Impedance reported for an open circuit.
pub const HP_Z_OPEN: u32 = 0x7FFF_FFFF;

/// Impedance reported when HPDET saturates its top range.
pub const HPDET_MAX: u32 = 10_000;
