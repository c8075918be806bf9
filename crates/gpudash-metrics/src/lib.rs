//! Metric acquisition and time-series bookkeeping for gpudash.
//!
//! Readings are fetched from the dashboard backend by a [`poller`], turned
//! into [`snapshot::Snapshot`]s with rate fields from [`derive`], and kept by
//! a pause-aware [`accumulator::Accumulator`] that the chart panels render.
//! Nothing in here touches the terminal.

pub mod accumulator;
pub mod derive;
pub mod error;
pub mod poller;
pub mod reading;
pub mod snapshot;
pub mod source;

pub use accumulator::{Accumulator, FlushPolicy, Ingest, PauseState};
pub use error::FetchError;
pub use poller::{Delivery, InstanceId, PollerHandle};
pub use reading::{AnyReading, Reading};
pub use snapshot::Snapshot;
