//! Periodic fetch loop, one task per open chart.
//!
//! The task owns no chart state. It fetches, decodes and validates a
//! reading each tick and sends it to the UI thread tagged with the chart
//! instance it belongs to; whether the chart is paused is decided there at
//! delivery time. A request is awaited before the next tick starts, so at
//! most one request per chart is in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::reading::{AnyReading, Reading};
use crate::snapshot::now_ms;
use crate::source::MetricsSource;

/// Identity of one opened chart.
///
/// Re-opening a closed chart bumps the generation, so deliveries still in
/// flight for the old instance can be told apart from the new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub chart: String,
    pub generation: u64,
}

impl InstanceId {
    pub fn new(chart: impl Into<String>, generation: u64) -> Self {
        Self {
            chart: chart.into(),
            generation,
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.chart, self.generation)
    }
}

/// A validated reading on its way to a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub instance: InstanceId,
    pub received_at_ms: u64,
    pub reading: AnyReading,
}

/// Owner's handle on a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    instance: InstanceId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Stop polling. A request in flight is abandoned and never delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start polling `T::ENDPOINT` on `runtime` every `period`.
///
/// The first request goes out immediately.
pub fn spawn<T: Reading>(
    runtime: &Handle,
    source: Arc<dyn MetricsSource>,
    instance: InstanceId,
    period: Duration,
    tx: UnboundedSender<Delivery>,
) -> PollerHandle {
    let cancel = CancellationToken::new();
    let task = runtime.spawn(run::<T>(
        source,
        instance.clone(),
        period,
        tx,
        cancel.clone(),
    ));
    tracing::debug!(
        instance = %instance,
        endpoint = T::ENDPOINT,
        period_ms = period.as_millis() as u64,
        "poller started"
    );
    PollerHandle {
        instance,
        cancel,
        task,
    }
}

async fn run<T: Reading>(
    source: Arc<dyn MetricsSource>,
    instance: InstanceId,
    period: Duration,
    tx: UnboundedSender<Delivery>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => break,
            res = source.fetch(T::ENDPOINT) => res,
        };

        match body.and_then(T::decode) {
            Ok(reading) => {
                if cancel.is_cancelled() {
                    break;
                }
                let delivery = Delivery {
                    instance: instance.clone(),
                    received_at_ms: now_ms(),
                    reading: reading.into_any(),
                };
                if tx.send(delivery).is_err() {
                    // UI side is gone.
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(
                    instance = %instance,
                    endpoint = T::ENDPOINT,
                    kind = err.kind(),
                    error = %err,
                    "poll tick skipped"
                );
            }
        }
    }

    tracing::debug!(instance = %instance, "poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::reading::GpuUtilizationReading;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Notify};

    /// Answers with an increasing utilization value; fails on listed calls.
    struct CountingSource {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl CountingSource {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&n) {
                return Err(FetchError::Status {
                    endpoint: endpoint.to_string(),
                    status: 500,
                });
            }
            Ok(json!({ "gpu_utilization": [n as f64] }))
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    /// Blocks every request until released.
    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MetricsSource for GatedSource {
        async fn fetch(&self, _endpoint: &str) -> Result<Value, FetchError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(json!({ "gpu_utilization": [1.0] }))
        }

        fn describe(&self) -> String {
            "gated".into()
        }
    }

    fn value(d: &Delivery) -> f64 {
        match &d.reading {
            AnyReading::GpuUtilization(r) => r.gpu_utilization[0],
            other => panic!("unexpected reading {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_order_and_skips_failed_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = Arc::new(CountingSource::new(vec![1]));
        let handle = spawn::<GpuUtilizationReading>(
            &Handle::current(),
            source,
            InstanceId::new("gpu-utilization", 1),
            Duration::from_millis(1000),
            tx,
        );

        let mut got = Vec::new();
        for _ in 0..3 {
            let d = rx.recv().await.unwrap();
            assert_eq!(d.instance, InstanceId::new("gpu-utilization", 1));
            got.push(value(&d));
        }
        // Call #1 failed and produced nothing.
        assert_eq!(got, vec![0.0, 2.0, 3.0]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_body_is_not_delivered() {
        struct Broken;

        #[async_trait]
        impl MetricsSource for Broken {
            async fn fetch(&self, _endpoint: &str) -> Result<Value, FetchError> {
                Ok(json!({ "gpu_utilization": "lots" }))
            }
            fn describe(&self) -> String {
                "broken".into()
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn::<GpuUtilizationReading>(
            &Handle::current(),
            Arc::new(Broken),
            InstanceId::new("gpu-utilization", 1),
            Duration::from_millis(1000),
            tx,
        );
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(rx.try_recv().is_err());
        handle.shutdown().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_with_request_in_flight_delivers_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = Arc::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let handle = spawn::<GpuUtilizationReading>(
            &Handle::current(),
            source.clone(),
            InstanceId::new("gpu-utilization", 7),
            Duration::from_millis(1000),
            tx,
        );

        source.entered.notified().await;
        handle.cancel();
        source.release.notify_one();
        handle.shutdown().await;

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn::<GpuUtilizationReading>(
            &Handle::current(),
            Arc::new(CountingSource::new(Vec::new())),
            InstanceId::new("gpu-utilization", 1),
            Duration::from_millis(1000),
            tx,
        );
        assert!(rx.recv().await.is_some());
        drop(handle);
        // Channel closes once the task notices the cancellation.
        while rx.recv().await.is_some() {}
    }

    #[test]
    fn instance_display() {
        assert_eq!(InstanceId::new("machine", 3).to_string(), "machine#3");
    }
}
