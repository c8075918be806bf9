//! Typed payloads of the dashboard backend endpoints.
//!
//! Each endpoint under `GPUDashboard/` answers with a flat JSON object. The
//! structs here mirror those objects field for field; required fields are
//! not defaulted so a partial response fails to decode instead of being
//! charted with holes.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::derive::counter_delta;
use crate::error::FetchError;

/// One decoded response from a metrics endpoint.
pub trait Reading: DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + 'static {
    /// Endpoint name below `GPUDashboard/`.
    const ENDPOINT: &'static str;

    /// Per-tick deltas derived from cumulative counters. `()` when the
    /// reading carries no counters.
    type Rates: Clone + fmt::Debug + PartialEq + Send + 'static;

    /// Reject values that would corrupt charts or rate computation.
    fn validate(&self) -> Result<(), String>;

    /// Length of the per-device sequences, if the reading has any.
    fn device_count(&self) -> Option<usize> {
        None
    }

    /// Deltas of every counter field against an earlier reading.
    fn rates_since(&self, previous: &Self) -> Self::Rates;

    fn into_any(self) -> AnyReading;

    fn from_any(any: AnyReading) -> Option<Self>;

    /// Decode and validate a raw response body.
    fn decode(body: serde_json::Value) -> Result<Self, FetchError> {
        let reading: Self =
            serde_json::from_value(body).map_err(|source| FetchError::Decode {
                endpoint: Self::ENDPOINT.to_string(),
                source,
            })?;
        reading
            .validate()
            .map_err(|reason| FetchError::invalid(Self::ENDPOINT, reason))?;
        Ok(reading)
    }
}

/// A reading of any endpoint, as carried across the poller channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyReading {
    Machine(MachineReading),
    GpuResource(GpuResourceReading),
    GpuUsage(GpuUsageReading),
    GpuUtilization(GpuUtilizationReading),
}

impl AnyReading {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Machine(_) => MachineReading::ENDPOINT,
            Self::GpuResource(_) => GpuResourceReading::ENDPOINT,
            Self::GpuUsage(_) => GpuUsageReading::ENDPOINT,
            Self::GpuUtilization(_) => GpuUtilizationReading::ENDPOINT,
        }
    }
}

fn ensure_finite(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{name} is not a finite number"))
    }
}

fn ensure_all_finite(name: &str, values: &[f64]) -> Result<(), String> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(format!("{name}[{idx}] is not a finite number")),
        None => Ok(()),
    }
}

// ── cpu_resource ──

/// Host-level CPU, memory, disk and network counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineReading {
    /// Backend clock in epoch milliseconds.
    #[serde(default)]
    pub time: Option<f64>,
    /// CPU utilization, percent.
    pub cpu_utilization: f64,
    /// Used memory, bytes.
    pub memory_usage: u64,
    /// Cumulative bytes read from disk.
    pub disk_read: u64,
    /// Cumulative bytes written to disk.
    pub disk_write: u64,
    /// Cumulative bytes received over the network.
    pub network_read: u64,
    /// Cumulative bytes sent over the network.
    pub network_write: u64,
}

/// Bytes moved since the previous series entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineRates {
    pub disk_read_current: u64,
    pub disk_write_current: u64,
    pub network_read_current: u64,
    pub network_write_current: u64,
}

impl Reading for MachineReading {
    const ENDPOINT: &'static str = "cpu_resource";
    type Rates = MachineRates;

    fn validate(&self) -> Result<(), String> {
        ensure_finite("cpu_utilization", self.cpu_utilization)?;
        if let Some(time) = self.time {
            ensure_finite("time", time)?;
        }
        Ok(())
    }

    fn rates_since(&self, previous: &Self) -> MachineRates {
        MachineRates {
            disk_read_current: counter_delta(self.disk_read, previous.disk_read),
            disk_write_current: counter_delta(self.disk_write, previous.disk_write),
            network_read_current: counter_delta(self.network_read, previous.network_read),
            network_write_current: counter_delta(self.network_write, previous.network_write),
        }
    }

    fn into_any(self) -> AnyReading {
        AnyReading::Machine(self)
    }

    fn from_any(any: AnyReading) -> Option<Self> {
        match any {
            AnyReading::Machine(r) => Some(r),
            _ => None,
        }
    }
}

// ── gpu_resource ──

/// Utilization and memory of one GPU inside a [`GpuResourceReading`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    /// Percent.
    #[serde(alias = "gpu_utilization_individual")]
    pub utilization: f64,
    /// Bytes in use.
    #[serde(alias = "gpu_memory_individual")]
    pub memory: f64,
}

/// Aggregate and per-device GPU load plus PCIe throughput.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuResourceReading {
    #[serde(default)]
    pub time: Option<f64>,
    pub gpu_utilization_total: f64,
    pub gpu_memory_total: f64,
    /// PCIe receive throughput summed over devices.
    pub rx_total: f64,
    /// PCIe transmit throughput summed over devices.
    pub tx_total: f64,
    pub gpu_devices: Vec<GpuDevice>,
}

impl Reading for GpuResourceReading {
    const ENDPOINT: &'static str = "gpu_resource";
    type Rates = ();

    fn validate(&self) -> Result<(), String> {
        ensure_finite("gpu_utilization_total", self.gpu_utilization_total)?;
        ensure_finite("gpu_memory_total", self.gpu_memory_total)?;
        ensure_finite("rx_total", self.rx_total)?;
        ensure_finite("tx_total", self.tx_total)?;
        for (idx, dev) in self.gpu_devices.iter().enumerate() {
            ensure_finite(&format!("gpu_devices[{idx}].utilization"), dev.utilization)?;
            ensure_finite(&format!("gpu_devices[{idx}].memory"), dev.memory)?;
        }
        Ok(())
    }

    fn device_count(&self) -> Option<usize> {
        Some(self.gpu_devices.len())
    }

    fn rates_since(&self, _previous: &Self) {}

    fn into_any(self) -> AnyReading {
        AnyReading::GpuResource(self)
    }

    fn from_any(any: AnyReading) -> Option<Self> {
        match any {
            AnyReading::GpuResource(r) => Some(r),
            _ => None,
        }
    }
}

// ── gpu_usage ──

/// Memory in use and installed per GPU, bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuUsageReading {
    pub memory_usage: Vec<f64>,
    pub total_memory: Vec<f64>,
}

impl GpuUsageReading {
    /// Sum of used memory over all devices.
    pub fn used_sum(&self) -> f64 {
        self.memory_usage.iter().sum()
    }

    /// Largest installed memory of any device; the bar chart's scale.
    pub fn max_total(&self) -> f64 {
        self.total_memory.iter().copied().fold(0.0, f64::max)
    }
}

impl Reading for GpuUsageReading {
    const ENDPOINT: &'static str = "gpu_usage";
    type Rates = ();

    fn validate(&self) -> Result<(), String> {
        ensure_all_finite("memory_usage", &self.memory_usage)?;
        ensure_all_finite("total_memory", &self.total_memory)?;
        if self.memory_usage.len() != self.total_memory.len() {
            return Err(format!(
                "memory_usage has {} devices but total_memory has {}",
                self.memory_usage.len(),
                self.total_memory.len()
            ));
        }
        Ok(())
    }

    fn device_count(&self) -> Option<usize> {
        Some(self.memory_usage.len())
    }

    fn rates_since(&self, _previous: &Self) {}

    fn into_any(self) -> AnyReading {
        AnyReading::GpuUsage(self)
    }

    fn from_any(any: AnyReading) -> Option<Self> {
        match any {
            AnyReading::GpuUsage(r) => Some(r),
            _ => None,
        }
    }
}

// ── gpu_utilization ──

/// Utilization per GPU, percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuUtilizationReading {
    pub gpu_utilization: Vec<f64>,
}

impl Reading for GpuUtilizationReading {
    const ENDPOINT: &'static str = "gpu_utilization";
    type Rates = ();

    fn validate(&self) -> Result<(), String> {
        ensure_all_finite("gpu_utilization", &self.gpu_utilization)
    }

    fn device_count(&self) -> Option<usize> {
        Some(self.gpu_utilization.len())
    }

    fn rates_since(&self, _previous: &Self) {}

    fn into_any(self) -> AnyReading {
        AnyReading::GpuUtilization(self)
    }

    fn from_any(any: AnyReading) -> Option<Self> {
        match any {
            AnyReading::GpuUtilization(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn machine_decodes_backend_shape() {
        let body = json!({
            "time": 1_700_000_000_000.0,
            "cpu_utilization": 12.5,
            "memory_usage": 8_000_000_000u64,
            "disk_read": 100,
            "disk_write": 200,
            "network_read": 300,
            "network_write": 400
        });
        let r = MachineReading::decode(body).unwrap();
        assert_eq!(r.cpu_utilization, 12.5);
        assert_eq!(r.disk_write, 200);
        assert_eq!(r.time, Some(1_700_000_000_000.0));
    }

    #[test]
    fn machine_missing_counter_fails_loudly() {
        let body = json!({
            "cpu_utilization": 12.5,
            "memory_usage": 1,
            "disk_read": 100,
            "disk_write": 200,
            "network_read": 300
        });
        let err = MachineReading::decode(body).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(err.to_string().contains("network_write"));
    }

    #[test]
    fn gpu_resource_accepts_backend_device_keys() {
        let body = json!({
            "time": 1.0,
            "gpu_utilization_total": 40.0,
            "gpu_memory_total": 2048.0,
            "rx_total": 10.0,
            "tx_total": 20.0,
            "gpu_devices": [
                {"gpu_utilization_individual": 30.0, "gpu_memory_individual": 1024.0},
                {"gpu_utilization_individual": 50.0, "gpu_memory_individual": 1024.0}
            ]
        });
        let r = GpuResourceReading::decode(body).unwrap();
        assert_eq!(r.device_count(), Some(2));
        assert_eq!(r.gpu_devices[1].utilization, 50.0);
    }

    #[test]
    fn gpu_usage_rejects_mismatched_lengths() {
        let body = json!({
            "memory_usage": [1.0, 2.0],
            "total_memory": [4.0]
        });
        let err = GpuUsageReading::decode(body).unwrap_err();
        assert!(matches!(err, FetchError::Invalid { .. }));
    }

    #[test]
    fn gpu_usage_aggregates() {
        let r = GpuUsageReading {
            memory_usage: vec![1.0, 3.0],
            total_memory: vec![8.0, 16.0],
        };
        assert_eq!(r.used_sum(), 4.0);
        assert_eq!(r.max_total(), 16.0);
    }

    #[test]
    fn any_reading_round_trips_variant() {
        let r = GpuUtilizationReading {
            gpu_utilization: vec![10.0],
        };
        let any = r.clone().into_any();
        assert_eq!(any.endpoint(), "gpu_utilization");
        assert_eq!(GpuUtilizationReading::from_any(any.clone()), Some(r));
        assert_eq!(GpuUsageReading::from_any(any), None);
    }

    #[test]
    fn machine_rates_are_counter_deltas() {
        let prev = MachineReading {
            time: None,
            cpu_utilization: 0.0,
            memory_usage: 0,
            disk_read: 100,
            disk_write: 10,
            network_read: 5,
            network_write: 7,
        };
        let cur = MachineReading {
            disk_read: 140,
            disk_write: 10,
            network_read: 25,
            network_write: 8,
            ..prev.clone()
        };
        let rates = cur.rates_since(&prev);
        assert_eq!(
            rates,
            MachineRates {
                disk_read_current: 40,
                disk_write_current: 0,
                network_read_current: 20,
                network_write_current: 1,
            }
        );
    }
}
