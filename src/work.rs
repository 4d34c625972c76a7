//! Deferred work queue.
//!
//! One slot per kind of delayed work, each holding an optional deadline.
//! The queue never runs anything itself: the reactor asks for due items via
//! [`WorkQueue::take_due`] and runs them under the controller lock, so a
//! cancelled item can never fire afterwards.
//!
//! ```text
//!   schedule(kind, now + delay) ──▶ [ slot per WorkKind ] ──▶ take_due(now)
//!   cancel(kind) ─────────────────▶        (cleared)
//! ```

use embassy_time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════
//  Work kinds
// ═══════════════════════════════════════════════════════════════

/// Kinds of deferred work.  Lower discriminant runs first when two items
/// share a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkKind {
    /// Active state's recovery timeout.
    StateTimeout = 0,
    /// Accessory identification after insertion settles.
    HpdetDebounce = 1,
    /// Delayed first detection state after insertion.
    InitialDetect = 2,
    /// Debounced mic detect handling.
    MicdDetect = 3,
    /// Mic input clear after MICD events.
    MicdClear = 4,
}

impl WorkKind {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::StateTimeout,
        Self::HpdetDebounce,
        Self::InitialDetect,
        Self::MicdDetect,
        Self::MicdClear,
    ];
}

// ═══════════════════════════════════════════════════════════════
//  Queue
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    deadlines: [Option<Instant>; WorkKind::COUNT],
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `kind` to run `delay` after `now`.  An already pending item
    /// keeps its original deadline.  Returns whether it was queued.
    pub fn schedule(&mut self, kind: WorkKind, now: Instant, delay: Duration) -> bool {
        let slot = &mut self.deadlines[kind as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(now + delay);
        true
    }

    /// Drop a pending item.  Returns whether it was pending.
    pub fn cancel(&mut self, kind: WorkKind) -> bool {
        self.deadlines[kind as usize].take().is_some()
    }

    pub fn cancel_all(&mut self) {
        self.deadlines = [None; WorkKind::COUNT];
    }

    pub fn is_pending(&self, kind: WorkKind) -> bool {
        self.deadlines[kind as usize].is_some()
    }

    pub fn deadline(&self, kind: WorkKind) -> Option<Instant> {
        self.deadlines[kind as usize]
    }

    /// Remove and return the earliest item due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<WorkKind> {
        let kind = WorkKind::ALL
            .into_iter()
            .filter_map(|k| self.deadlines[k as usize].map(|at| (at, k)))
            .filter(|&(at, _)| at <= now)
            .min_by_key(|&(at, k)| (at, k as u8))
            .map(|(_, k)| k)?;
        self.deadlines[kind as usize] = None;
        Some(kind)
    }

    /// Earliest pending deadline, for arming a wake-up timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.deadlines.iter().all(Option::is_none)
    }
}
