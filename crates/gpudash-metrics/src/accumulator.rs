//! Pause-aware history of one chart.
//!
//! Snapshots keep arriving while a chart is paused. They are parked in a
//! pending buffer that is invisible to rendering and moved onto the series,
//! in arrival order, together with the first snapshot that arrives after
//! the chart is resumed.

use std::fmt;

use crate::reading::Reading;
use crate::snapshot::Snapshot;

/// Whether new snapshots extend the series or wait in the pending buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseState {
    #[default]
    Running,
    Paused,
}

impl PauseState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Running => Self::Paused,
            Self::Paused => Self::Running,
        }
    }
}

impl fmt::Display for PauseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// What happens to the pending buffer on the first snapshot after resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Flush whatever is pending. Nothing is lost.
    #[default]
    Always,
    /// Flush only batches of at least this many snapshots; smaller batches
    /// are discarded.
    MinBatch(usize),
}

impl FlushPolicy {
    fn flushes(self, pending: usize) -> bool {
        match self {
            Self::Always => pending > 0,
            Self::MinBatch(min) => pending >= min.max(1),
        }
    }
}

/// Where an ingested snapshot went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Appended to the series after `flushed` pending snapshots; `discarded`
    /// pending snapshots were dropped by a [`FlushPolicy::MinBatch`].
    Appended { flushed: usize, discarded: usize },
    /// Parked in the pending buffer, which now holds `pending` snapshots.
    Buffered { pending: usize },
}

/// Series, pending buffer and pause state of one chart instance.
pub struct Accumulator<T: Reading> {
    series: Vec<Snapshot<T>>,
    pending: Vec<Snapshot<T>>,
    state: PauseState,
    policy: FlushPolicy,
    discarded: usize,
}

impl<T: Reading> Default for Accumulator<T> {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}

impl<T: Reading> Accumulator<T> {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            series: Vec::new(),
            pending: Vec::new(),
            state: PauseState::Running,
            policy,
            discarded: 0,
        }
    }

    /// Flip between running and paused. Touches neither buffer.
    pub fn toggle(&mut self) -> PauseState {
        self.state = self.state.toggled();
        self.state
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PauseState::Paused
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// The visible history, oldest first.
    pub fn series(&self) -> &[Snapshot<T>] {
        &self.series
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Snapshots dropped by the flush policy over this chart's lifetime.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Last visible snapshot.
    pub fn latest(&self) -> Option<&Snapshot<T>> {
        self.series.last()
    }

    /// `true` if `reading` has the same device count as the history so far.
    ///
    /// Per-device sequences must keep their length for the life of a chart.
    pub fn shape_matches(&self, reading: &T) -> bool {
        let known = self
            .series
            .first()
            .or_else(|| self.pending.first())
            .map(|s| s.reading.device_count());
        match known {
            Some(count) => count == reading.device_count(),
            None => true,
        }
    }

    /// Capture `reading` against the series tail and classify it.
    pub fn ingest(&mut self, reading: T, timestamp_ms: u64) -> Ingest {
        let snapshot = Snapshot::capture(reading, timestamp_ms, self.series.last());
        self.push(snapshot)
    }

    /// Classify an already captured snapshot.
    pub fn push(&mut self, snapshot: Snapshot<T>) -> Ingest {
        match self.state {
            PauseState::Paused => {
                self.pending.push(snapshot);
                Ingest::Buffered {
                    pending: self.pending.len(),
                }
            }
            PauseState::Running => {
                let pending = std::mem::take(&mut self.pending);
                let (flushed, discarded) = if self.policy.flushes(pending.len()) {
                    let n = pending.len();
                    self.series.extend(pending);
                    (n, 0)
                } else {
                    (0, pending.len())
                };
                self.discarded += discarded;
                self.series.push(snapshot);
                Ingest::Appended { flushed, discarded }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{GpuUtilizationReading, MachineReading};

    fn util(v: f64) -> GpuUtilizationReading {
        GpuUtilizationReading {
            gpu_utilization: vec![v],
        }
    }

    fn values(acc: &Accumulator<GpuUtilizationReading>) -> Vec<f64> {
        acc.series()
            .iter()
            .map(|s| s.reading.gpu_utilization[0])
            .collect()
    }

    /// Feed `0..before`, pause, feed `m` more, resume, feed one trigger.
    fn pause_scenario(policy: FlushPolicy, before: usize, m: usize) -> Accumulator<GpuUtilizationReading> {
        let mut acc = Accumulator::new(policy);
        let mut t = 0u64;
        for _ in 0..before {
            acc.ingest(util(t as f64), t);
            t += 1;
        }
        acc.toggle();
        for _ in 0..m {
            acc.ingest(util(t as f64), t);
            t += 1;
        }
        acc.toggle();
        acc.ingest(util(t as f64), t);
        acc
    }

    #[test]
    fn running_series_matches_arrival_order() {
        let mut acc = Accumulator::default();
        for i in 0..50 {
            let out = acc.ingest(util(i as f64), i);
            assert_eq!(out, Ingest::Appended { flushed: 0, discarded: 0 });
        }
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(values(&acc), expected);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn paused_snapshots_do_not_touch_series() {
        let mut acc = Accumulator::default();
        acc.ingest(util(0.0), 0);
        acc.toggle();
        assert_eq!(acc.ingest(util(1.0), 1), Ingest::Buffered { pending: 1 });
        assert_eq!(acc.ingest(util(2.0), 2), Ingest::Buffered { pending: 2 });
        assert_eq!(values(&acc), vec![0.0]);
        assert_eq!(acc.pending_len(), 2);
    }

    #[test]
    fn resume_flushes_pending_before_trigger() {
        let acc = pause_scenario(FlushPolicy::Always, 3, 4);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(acc.pending_len(), 0);
        assert_eq!(acc.discarded(), 0);
    }

    #[test]
    fn always_policy_with_nothing_buffered() {
        let acc = pause_scenario(FlushPolicy::Always, 2, 0);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn always_policy_flushes_single_buffered() {
        let acc = pause_scenario(FlushPolicy::Always, 2, 1);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(acc.discarded(), 0);
    }

    #[test]
    fn min_batch_with_nothing_buffered() {
        let acc = pause_scenario(FlushPolicy::MinBatch(2), 2, 0);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0]);
        assert_eq!(acc.discarded(), 0);
    }

    #[test]
    fn min_batch_discards_single_buffered() {
        let acc = pause_scenario(FlushPolicy::MinBatch(2), 2, 1);
        // Snapshot 2 was buffered alone and dropped; 3 is the trigger.
        assert_eq!(values(&acc), vec![0.0, 1.0, 3.0]);
        assert_eq!(acc.discarded(), 1);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn min_batch_flushes_full_batch() {
        let acc = pause_scenario(FlushPolicy::MinBatch(2), 1, 2);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn min_batch_zero_behaves_like_always() {
        let acc = pause_scenario(FlushPolicy::MinBatch(0), 1, 1);
        assert_eq!(values(&acc), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn double_toggle_without_snapshot_changes_nothing() {
        let mut acc = Accumulator::default();
        acc.ingest(util(0.0), 0);
        acc.toggle();
        acc.ingest(util(1.0), 1);

        assert_eq!(acc.toggle(), PauseState::Running);
        assert_eq!(acc.toggle(), PauseState::Paused);
        assert_eq!(values(&acc), vec![0.0]);
        assert_eq!(acc.pending_len(), 1);
    }

    #[test]
    fn rates_use_series_tail_not_pending() {
        let base = MachineReading {
            time: None,
            cpu_utilization: 0.0,
            memory_usage: 0,
            disk_read: 100,
            disk_write: 0,
            network_read: 0,
            network_write: 0,
        };
        let mut acc = Accumulator::default();
        acc.ingest(base.clone(), 0);
        acc.toggle();
        acc.ingest(MachineReading { disk_read: 150, ..base.clone() }, 1);
        acc.ingest(MachineReading { disk_read: 170, ..base.clone() }, 2);
        acc.toggle();
        acc.ingest(MachineReading { disk_read: 180, ..base }, 3);

        let rates: Vec<Option<u64>> = acc
            .series()
            .iter()
            .map(|s| s.rates.map(|r| r.disk_read_current))
            .collect();
        assert_eq!(rates, vec![None, Some(50), Some(70), Some(80)]);
    }

    #[test]
    fn shape_change_is_detected() {
        let mut acc = Accumulator::default();
        assert!(acc.shape_matches(&util(1.0)));
        acc.ingest(util(1.0), 0);
        let two = GpuUtilizationReading {
            gpu_utilization: vec![1.0, 2.0],
        };
        assert!(!acc.shape_matches(&two));
        assert!(acc.shape_matches(&util(3.0)));
    }

    #[test]
    fn pause_state_display() {
        assert_eq!(PauseState::Running.to_string(), "RUNNING");
        assert_eq!(PauseState::Paused.to_string(), "PAUSED");
    }
}
