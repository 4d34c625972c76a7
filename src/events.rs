//! Interrupt hand-off.
//!
//! The codec raises three detection interrupts.  Interrupt context may not
//! take the controller lock, so it only sets a pending bit here; the
//! reactor drains the bits and runs the matching handlers under the lock.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ JACKDET IRQ  │────▶│                │     │                  │
//! │ HPDET IRQ    │────▶│  IrqMailbox    │────▶│  service(now)    │
//! │ MICDET IRQ   │────▶│  (AtomicU8)    │     │  (consumer)      │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//! ```
//!
//! A line raised twice before it is drained is handled once; every
//! handler re-reads hardware state, so nothing is lost.

use core::sync::atomic::{AtomicU8, Ordering};

/// Detection interrupt lines, in drain priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrqLine {
    /// Jack insertion/removal (JD1 or MICD clamp, rise and fall).
    JackDetect = 0,
    /// Headphone impedance measurement complete.
    HpDetect = 1,
    /// Mic detect comparator changed.
    MicDetect = 2,
}

impl IrqLine {
    pub const ALL: [Self; 3] = [Self::JackDetect, Self::HpDetect, Self::MicDetect];

    const fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// Pending interrupt bits.  Lock-free, safe to share with ISRs.
#[derive(Debug, Default)]
pub struct IrqMailbox {
    pending: AtomicU8,
}

impl IrqMailbox {
    pub const fn new() -> Self {
        Self { pending: AtomicU8::new(0) }
    }

    /// Mark `line` pending.  Callable from interrupt context.
    pub fn raise(&self, line: IrqLine) {
        self.pending.fetch_or(line.mask(), Ordering::Release);
    }

    /// Take the highest priority pending line, clearing it.
    pub fn take(&self) -> Option<IrqLine> {
        let pending = self.pending.load(Ordering::Acquire);
        let line = IrqLine::ALL.into_iter().find(|l| pending & l.mask() != 0)?;
        self.pending.fetch_and(!line.mask(), Ordering::AcqRel);
        Some(line)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }
}
