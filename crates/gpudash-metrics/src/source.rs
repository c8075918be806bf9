//! Where readings come from.
//!
//! [`HttpSource`] talks to the dashboard backend. [`SystemSource`] computes
//! the `cpu_resource` reading in-process with `sysinfo`, for running the
//! machine chart without a server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sysinfo::{Networks, ProcessesToUpdate, System};

use crate::error::FetchError;
use crate::reading::{MachineReading, Reading};
use crate::snapshot::now_ms;

/// Route prefix shared by every dashboard endpoint.
pub const ROUTE_PREFIX: &str = "GPUDashboard";

/// A backend that can answer metric endpoint requests.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch the raw JSON body of `endpoint`.
    async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError>;

    /// Human-readable origin, for logs and the status command.
    fn describe(&self) -> String;
}

/// Reads endpoints over HTTP from a Jupyter server running the dashboard
/// handlers.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSource {
    /// Build a source for `base_url` with a per-request timeout.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Full URL of `endpoint`.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, ROUTE_PREFIX, endpoint)
    }
}

#[async_trait]
impl MetricsSource for HttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError> {
        let transport = |source| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let mut req = self.client.get(self.url(endpoint));
        if let Some(token) = &self.token {
            req = req.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }

        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }
}

/// Serves `cpu_resource` from the local machine.
///
/// Disk counters are the sum of per-process cumulative I/O, network
/// counters the sum over all interfaces.
pub struct SystemSource {
    sys: Arc<Mutex<System>>,
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Baseline so the first reading has a real CPU delta.
        sys.refresh_cpu_usage();
        Self {
            sys: Arc::new(Mutex::new(sys)),
        }
    }

    /// Full process and interface scan; blocks, run it off the async workers.
    fn sample(sys: &Mutex<System>) -> Result<MachineReading, FetchError> {
        let mut sys = sys
            .lock()
            .map_err(|_| FetchError::invalid(MachineReading::ENDPOINT, "sampler lock poisoned"))?;

        sys.refresh_cpu_usage();
        sys.refresh_memory();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let (disk_read, disk_write) = sys.processes().values().fold((0u64, 0u64), |acc, p| {
            let usage = p.disk_usage();
            (
                acc.0.saturating_add(usage.total_read_bytes),
                acc.1.saturating_add(usage.total_written_bytes),
            )
        });

        let networks = Networks::new_with_refreshed_list();
        let (network_read, network_write) =
            networks.list().values().fold((0u64, 0u64), |acc, data| {
                (
                    acc.0.saturating_add(data.total_received()),
                    acc.1.saturating_add(data.total_transmitted()),
                )
            });

        Ok(MachineReading {
            time: Some(now_ms() as f64),
            cpu_utilization: f64::from(sys.global_cpu_usage()),
            memory_usage: sys.used_memory(),
            disk_read,
            disk_write,
            network_read,
            network_write,
        })
    }
}

#[async_trait]
impl MetricsSource for SystemSource {
    async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError> {
        if endpoint != MachineReading::ENDPOINT {
            return Err(FetchError::Unsupported(endpoint.to_string()));
        }
        let sys = Arc::clone(&self.sys);
        let reading = tokio::task::spawn_blocking(move || Self::sample(&sys))
            .await
            .map_err(|e| FetchError::invalid(endpoint, format!("sampler task failed: {e}")))??;
        serde_json::to_value(reading).map_err(|source| FetchError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    fn describe(&self) -> String {
        "local sysinfo".to_string()
    }
}
