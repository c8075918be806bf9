//! Rate fields computed from cumulative counters.
//!
//! A rate is the difference between a counter in the new reading and the
//! same counter in the last entry of the visible series. The pending buffer
//! is never consulted, so readings captured while paused are all measured
//! against the entry that was on screen when the pause began.

use crate::reading::Reading;
use crate::snapshot::Snapshot;

/// Rate fields of `current` against the series tail, `None` without one.
pub fn derive_rates<T: Reading>(current: &T, last: Option<&Snapshot<T>>) -> Option<T::Rates> {
    last.map(|prev| current.rates_since(&prev.reading))
}

/// Difference between two samples of a non-decreasing counter.
///
/// A counter that went backwards was reset by the backend; that tick
/// reports `0` instead of wrapping.
pub fn counter_delta(current: u64, previous: u64) -> u64 {
    current.saturating_sub(previous)
}
