//! GPU panels: resource history, memory usage bars and utilization bars.

mod bars;
pub mod resource;
pub mod usage;
pub mod utilization;

pub use resource::GpuResourceModule;
pub use usage::GpuUsageModule;
pub use utilization::GpuUtilizationModule;
