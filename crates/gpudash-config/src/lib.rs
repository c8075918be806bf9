//! Configuration types and loaders for gpudash.
//!
//! This crate owns the on-disk configuration schema so the app shell and the
//! chart panels read the same settings.

pub mod dashboard;

pub use dashboard::{AccumulatorConfig, ConfigOrigin, DashboardConfig, FlushMode, MachineSource};
