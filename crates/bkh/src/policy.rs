//! ⚖️ The flush policy — the only interesting decision this crate makes.
//!
//! Three triggers compete over the same buffers every single iteration:
//! the heartbeat (flush NOW, a control record said so), the bulk count
//! (flush every N data records, no exceptions), and the idle gap (flush if
//! the last pull left us waiting too long). Everything else in this crate
//! is plumbing around these dozen lines. Treat them accordingly. 🦆
//!
//! The policy itself is pure: no I/O, no clock of its own, no mutable
//! state. You hand it the facts, it hands you a verdict. The consumer does
//! the actual draining — the policy never touches a buffer.

use std::time::{Duration, Instant};

/// 🏷️ Which trigger fired. Mostly for logs, occasionally for tests,
/// always for the postmortem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// 🫀 A control record demanded an immediate drain.
    Heartbeat,
    /// 🔢 The running data-record count hit a multiple of `bulk_size`.
    BulkCount,
    /// ⏳ The most recent blocking pull outlasted `max_wait`.
    IdleGap,
}

/// ⚖️ Pure flush arithmetic over a running counter, a deadline, and a signal.
///
/// A note on the time trigger, because everyone gets this wrong on first
/// read: the deadline is re-armed *before every pull*, and checked *after
/// that pull returns*. It therefore measures how long one pull blocked —
/// an idle-gap detector — and NOT the elapsed time since the last flush.
/// A steady trickle of records arriving just under `max_wait` apart will
/// never time-flush, even if the oldest buffered document is ancient.
/// That behavior is kept deliberately for compatibility with the systems
/// this sink replaces; if you want a true periodic deadline, track one
/// independently of the pull and don't call it `max_wait`.
#[derive(Debug, Clone)]
pub struct FlushPolicy {
    bulk_size: u64,
    max_wait: Duration,
}

impl FlushPolicy {
    /// 🏗️ `bulk_size` must be positive — the count trigger is modulo
    /// arithmetic and nobody needs a division by zero at record one.
    /// Callers validate at config time; this only backstops tests.
    pub fn new(bulk_size: u64, max_wait: Duration) -> Self {
        debug_assert!(bulk_size > 0, "bulk_size must be positive");
        Self {
            bulk_size,
            max_wait,
        }
    }

    /// ⏲️ Compute the pull deadline for the iteration that is about to
    /// block: `now + max_wait`. Call immediately before the pull, compare
    /// immediately after it returns.
    pub fn arm(&self, now: Instant) -> Instant {
        now + self.max_wait
    }

    /// ⚖️ The verdict for one consumed record.
    ///
    /// Triggers are evaluated heartbeat → count → gap, and the first
    /// positive one wins. The consumer drains every non-empty buffer once
    /// per verdict, so a record that trips two triggers at the same time
    /// (a heartbeat landing exactly on a count boundary, say) still causes
    /// exactly one drain.
    ///
    /// `record_count` is the cumulative number of data records consumed so
    /// far — it is never reset, so the count trigger fires on every nonzero
    /// multiple of `bulk_size`, regardless of which collections the records
    /// went to.
    pub fn decide(
        &self,
        heartbeat: bool,
        record_count: u64,
        deadline: Instant,
        now: Instant,
    ) -> Option<FlushTrigger> {
        if heartbeat {
            return Some(FlushTrigger::Heartbeat);
        }
        if record_count > 0 && record_count % self.bulk_size == 0 {
            return Some(FlushTrigger::BulkCount);
        }
        if now >= deadline {
            return Some(FlushTrigger::IdleGap);
        }
        None
    }
}
