//! Event-side plumbing shared by the chart panels: stale-delivery checks,
//! pause handling and the history or latest value a panel draws from.

use gpudash_metrics::{Accumulator, Delivery, FlushPolicy, Ingest, InstanceId, PauseState, Reading};

use crate::event::Event;

/// What a [`ChartFeed`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Ingested(Ingest),
    Toggled(PauseState),
    /// Delivery for an earlier instance of this chart.
    Stale,
    /// Delivery whose device count differs from the history.
    ShapeMismatch,
    /// Delivery carrying another endpoint's reading.
    WrongKind,
    Ignored,
}

/// Accumulated history of one open chart instance.
///
/// Accepts only deliveries stamped with its own [`InstanceId`], so a
/// reading that was in flight when an earlier instance was closed never
/// lands in a reopened chart.
pub struct ChartFeed<T: Reading> {
    instance: InstanceId,
    acc: Accumulator<T>,
}

impl<T: Reading> ChartFeed<T> {
    pub fn new(instance: InstanceId, policy: FlushPolicy) -> Self {
        Self {
            instance,
            acc: Accumulator::new(policy),
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn history(&self) -> &Accumulator<T> {
        &self.acc
    }

    pub fn state(&self) -> PauseState {
        self.acc.state()
    }

    /// Apply a sample or pause toggle addressed to this chart.
    pub fn handle(&mut self, ev: &Event) -> FeedOutcome {
        match ev {
            Event::Sample(delivery) => self.accept(delivery),
            Event::TogglePause { id } if *id == self.instance.chart => {
                let state = self.acc.toggle();
                tracing::info!(instance = %self.instance, state = %state, "pause toggled");
                FeedOutcome::Toggled(state)
            }
            _ => FeedOutcome::Ignored,
        }
    }

    fn accept(&mut self, delivery: &Delivery) -> FeedOutcome {
        let reading = match unpack::<T>(&self.instance, delivery) {
            Ok(reading) => reading,
            Err(outcome) => return outcome,
        };
        if !self.acc.shape_matches(&reading) {
            tracing::warn!(
                instance = %self.instance,
                devices = ?reading.device_count(),
                "device count changed, reading rejected"
            );
            return FeedOutcome::ShapeMismatch;
        }

        let outcome = self.acc.ingest(reading, delivery.received_at_ms);
        match outcome {
            Ingest::Appended { flushed, discarded } if discarded > 0 => {
                tracing::debug!(
                    instance = %self.instance,
                    flushed,
                    discarded,
                    "pending readings below flush threshold discarded"
                );
            }
            Ingest::Appended { flushed, .. } if flushed > 0 => {
                tracing::info!(instance = %self.instance, flushed, "pending readings released");
            }
            Ingest::Buffered { pending } => {
                tracing::trace!(instance = %self.instance, pending, "reading buffered");
            }
            Ingest::Appended { .. } => {}
        }
        FeedOutcome::Ingested(outcome)
    }
}

/// Take the reading out of a delivery meant for `instance`.
fn unpack<T: Reading>(instance: &InstanceId, delivery: &Delivery) -> Result<T, FeedOutcome> {
    if delivery.instance != *instance {
        tracing::debug!(
            expected = %instance,
            got = %delivery.instance,
            "ignoring stale delivery"
        );
        return Err(FeedOutcome::Stale);
    }
    T::from_any(delivery.reading.clone()).ok_or_else(|| {
        tracing::warn!(
            instance = %instance,
            endpoint = delivery.reading.endpoint(),
            "delivery of the wrong kind"
        );
        FeedOutcome::WrongKind
    })
}

/// Newest reading of a chart that shows only the current state.
pub struct LatestReading<T: Reading> {
    instance: InstanceId,
    latest: Option<(u64, T)>,
}

impl<T: Reading> LatestReading<T> {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            latest: None,
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn get(&self) -> Option<&T> {
        self.latest.as_ref().map(|(_, r)| r)
    }

    /// Arrival time of the current reading, epoch milliseconds.
    pub fn received_at_ms(&self) -> Option<u64> {
        self.latest.as_ref().map(|(ts, _)| *ts)
    }

    pub fn handle(&mut self, ev: &Event) -> FeedOutcome {
        let Event::Sample(delivery) = ev else {
            return FeedOutcome::Ignored;
        };
        match unpack::<T>(&self.instance, delivery) {
            Ok(reading) => {
                self.latest = Some((delivery.received_at_ms, reading));
                FeedOutcome::Ingested(Ingest::Appended {
                    flushed: 0,
                    discarded: 0,
                })
            }
            Err(outcome) => outcome,
        }
    }
}
