//! Chart catalog and the open/close lifecycle of chart instances.
//!
//! Opening a chart registers its panel and starts one poller for it;
//! closing removes the panel and cancels the poller. Every open gets a
//! fresh generation number so deliveries from a closed instance can never
//! reach a reopened one.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use ratatui::{layout::Rect, Frame};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use gpudash_core::{command::ChartInfo, event::Event, module::Module, registry::ModuleRegistry};
use gpudash_metrics::{
    poller,
    reading::{GpuResourceReading, GpuUsageReading, GpuUtilizationReading, MachineReading},
    source::MetricsSource,
    Delivery, FlushPolicy, InstanceId, PollerHandle, Reading,
};
use gpudash_mod_gpu::{GpuResourceModule, GpuUsageModule, GpuUtilizationModule};
use gpudash_mod_machine::MachineModule;
use gpudash_ui::renderer::HeroRenderer;

pub const CATALOG: &[ChartInfo] = &[
    ChartInfo {
        id: gpudash_mod_machine::CHART_ID,
        title: "Machine Resources",
        key: '1',
    },
    ChartInfo {
        id: gpudash_mod_gpu::resource::CHART_ID,
        title: "GPU Resources",
        key: '2',
    },
    ChartInfo {
        id: gpudash_mod_gpu::usage::CHART_ID,
        title: "GPU Memory Usage",
        key: '3',
    },
    ChartInfo {
        id: gpudash_mod_gpu::utilization::CHART_ID,
        title: "GPU Utilization",
        key: '4',
    },
];

pub fn chart_for_key(key: char) -> Option<&'static ChartInfo> {
    CATALOG.iter().find(|c| c.key == key)
}

/// A type-erased render function that downcasts a module via `Any` and draws
/// its hero area.
pub type RenderFn = Box<dyn Fn(&dyn Any, &mut Frame, Rect)>;

/// Open panels and how to draw them.
pub struct Panels {
    pub registry: ModuleRegistry,
    pub render_map: HashMap<String, RenderFn>,
}

impl Default for Panels {
    fn default() -> Self {
        Self::new()
    }
}

impl Panels {
    pub fn new() -> Self {
        Self {
            registry: ModuleRegistry::new(),
            render_map: HashMap::new(),
        }
    }

    /// Register a module that also implements `HeroRenderer`.
    ///
    /// Captures a type-aware render closure so the shell can call
    /// `render_hero` without knowing the concrete module type.
    pub fn register<M: Module + HeroRenderer + 'static>(&mut self, module: M) -> Result<()> {
        let id = module.id().to_string();
        self.registry.register(Box::new(module))?;
        self.render_map.insert(
            id,
            Box::new(|any, f, area| {
                if let Some(m) = any.downcast_ref::<M>() {
                    m.render_hero(f, area);
                }
            }),
        );
        Ok(())
    }

    pub fn render_active(&self, f: &mut Frame, area: Rect) {
        if let Some(m) = self.registry.active() {
            if let Some(render_fn) = self.render_map.get(m.id()) {
                render_fn(m.as_any(), f, area);
            }
        }
    }

    fn open_chart_ids(&self) -> Vec<String> {
        self.registry
            .iter()
            .filter(|m| m.closable())
            .map(|m| m.id().to_string())
            .collect()
    }
}

/// Settings every chart instance is created with.
#[derive(Debug, Clone, Copy)]
pub struct ChartSettings {
    pub period: Duration,
    pub policy: FlushPolicy,
    pub window: usize,
}

/// Where each endpoint is fetched from.
#[derive(Clone)]
pub struct Sources {
    pub gpu: Arc<dyn MetricsSource>,
    pub machine: Arc<dyn MetricsSource>,
}

/// Starts and stops chart instances.
pub struct ChartManager {
    runtime: Handle,
    sources: Sources,
    settings: ChartSettings,
    tx: UnboundedSender<Delivery>,
    pollers: HashMap<String, PollerHandle>,
    next_generation: u64,
}

impl ChartManager {
    pub fn new(
        runtime: Handle,
        sources: Sources,
        settings: ChartSettings,
        tx: UnboundedSender<Delivery>,
    ) -> Self {
        Self {
            runtime,
            sources,
            settings,
            tx,
            pollers: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    pub fn generation_of(&self, id: &str) -> Option<u64> {
        self.pollers.get(id).map(|p| p.instance().generation)
    }

    /// Open `id`, or focus it if already open. Returns events to publish.
    pub fn open(&mut self, id: &str, panels: &mut Panels) -> Result<Vec<Event>> {
        if panels.registry.contains(id) {
            tracing::debug!(chart = id, "chart already open, focusing");
            return panels.registry.activate(id);
        }

        let generation = self.next_generation;
        let ChartSettings { policy, window, .. } = self.settings;
        let handle = match id {
            gpudash_mod_machine::CHART_ID => {
                panels.register(MachineModule::new(generation, policy, window))?;
                self.spawn::<MachineReading>(id, generation, self.sources.machine.clone())
            }
            gpudash_mod_gpu::resource::CHART_ID => {
                panels.register(GpuResourceModule::new(generation, policy, window))?;
                self.spawn::<GpuResourceReading>(id, generation, self.sources.gpu.clone())
            }
            gpudash_mod_gpu::usage::CHART_ID => {
                panels.register(GpuUsageModule::new(generation))?;
                self.spawn::<GpuUsageReading>(id, generation, self.sources.gpu.clone())
            }
            gpudash_mod_gpu::utilization::CHART_ID => {
                panels.register(GpuUtilizationModule::new(generation))?;
                self.spawn::<GpuUtilizationReading>(id, generation, self.sources.gpu.clone())
            }
            other => bail!("unknown chart: {other}"),
        };
        self.next_generation += 1;
        self.pollers.insert(id.to_string(), handle);
        tracing::info!(chart = id, generation, "chart opened");

        let mut events = panels.registry.activate(id)?;
        events.push(Event::OpenCharts {
            ids: panels.open_chart_ids(),
        });
        Ok(events)
    }

    /// Close `id` and stop its poller. Returns events to publish.
    pub fn close(&mut self, id: &str, panels: &mut Panels) -> Result<Vec<Event>> {
        match panels.registry.get(id) {
            Some(m) if !m.closable() => bail!("{} cannot be closed", m.title()),
            Some(_) => {}
            None => bail!("chart '{id}' is not open"),
        }

        if let Some(handle) = self.pollers.remove(id) {
            handle.cancel();
        }
        let (_, mut events) = panels.registry.remove(id)?;
        panels.render_map.remove(id);
        tracing::info!(chart = id, "chart closed");

        events.push(Event::OpenCharts {
            ids: panels.open_chart_ids(),
        });
        Ok(events)
    }

    /// Cancel every poller.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.pollers.drain() {
            handle.cancel();
        }
    }

    fn spawn<T: Reading>(
        &self,
        id: &str,
        generation: u64,
        source: Arc<dyn MetricsSource>,
    ) -> PollerHandle {
        poller::spawn::<T>(
            &self.runtime,
            source,
            InstanceId::new(id, generation),
            self.settings.period,
            self.tx.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpudash_metrics::FetchError;
    use gpudash_mod_control::ControlModule;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    struct FixedSource;

    #[async_trait]
    impl MetricsSource for FixedSource {
        async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError> {
            Ok(match endpoint {
                "cpu_resource" => json!({
                    "cpu_utilization": 5.0,
                    "memory_usage": 1000,
                    "disk_read": 1,
                    "disk_write": 2,
                    "network_read": 3,
                    "network_write": 4
                }),
                "gpu_utilization" => json!({ "gpu_utilization": [10.0, 20.0] }),
                "gpu_usage" => json!({ "memory_usage": [1.0], "total_memory": [2.0] }),
                _ => json!({
                    "gpu_utilization_total": 1.0,
                    "gpu_memory_total": 1.0,
                    "rx_total": 0.0,
                    "tx_total": 0.0,
                    "gpu_devices": []
                }),
            })
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    fn setup() -> (ChartManager, Panels, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source: Arc<dyn MetricsSource> = Arc::new(FixedSource);
        let manager = ChartManager::new(
            Handle::current(),
            Sources {
                gpu: source.clone(),
                machine: source,
            },
            ChartSettings {
                period: Duration::from_millis(1000),
                policy: FlushPolicy::Always,
                window: 60,
            },
            tx,
        );
        let mut panels = Panels::new();
        panels.register(ControlModule::new(CATALOG, "fixed")).unwrap();
        (manager, panels, rx)
    }

    fn open_ids(events: &[Event]) -> Option<Vec<String>> {
        events.iter().find_map(|e| match e {
            Event::OpenCharts { ids } => Some(ids.clone()),
            _ => None,
        })
    }

    #[test]
    fn catalog_keys_resolve() {
        assert_eq!(chart_for_key('1').unwrap().id, "machine");
        assert_eq!(chart_for_key('4').unwrap().id, "gpu-utilization");
        assert!(chart_for_key('9').is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn open_registers_panel_and_poller() {
        let (mut manager, mut panels, mut rx) = setup();
        let events = manager.open("gpu-utilization", &mut panels).unwrap();

        assert!(panels.registry.contains("gpu-utilization"));
        assert!(panels.render_map.contains_key("gpu-utilization"));
        assert_eq!(panels.registry.active_id(), Some("gpu-utilization"));
        assert_eq!(open_ids(&events), Some(vec!["gpu-utilization".to_string()]));

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.instance, InstanceId::new("gpu-utilization", 1));
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn open_twice_focuses_without_new_poller() {
        let (mut manager, mut panels, _rx) = setup();
        manager.open("machine", &mut panels).unwrap();
        manager.open("gpu-usage", &mut panels).unwrap();
        let events = manager.open("machine", &mut panels).unwrap();

        assert_eq!(manager.poller_count(), 2);
        assert_eq!(panels.registry.active_id(), Some("machine"));
        assert!(open_ids(&events).is_none());
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn close_then_reopen_bumps_generation() {
        let (mut manager, mut panels, _rx) = setup();
        manager.open("gpu-resource", &mut panels).unwrap();
        assert_eq!(manager.generation_of("gpu-resource"), Some(1));

        let events = manager.close("gpu-resource", &mut panels).unwrap();
        assert!(!panels.registry.contains("gpu-resource"));
        assert!(!panels.render_map.contains_key("gpu-resource"));
        assert_eq!(manager.poller_count(), 0);
        assert_eq!(open_ids(&events), Some(vec![]));

        manager.open("gpu-resource", &mut panels).unwrap();
        assert_eq!(manager.generation_of("gpu-resource"), Some(2));
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_instance_delivers_nothing_further() {
        let (mut manager, mut panels, mut rx) = setup();
        manager.open("gpu-utilization", &mut panels).unwrap();
        rx.recv().await.unwrap();
        manager.close("gpu-utilization", &mut panels).unwrap();

        tokio::time::sleep(Duration::from_millis(5000)).await;
        while let Ok(d) = rx.try_recv() {
            // Anything already queued is routed to a closed chart and dropped.
            assert!(!panels.registry.broadcast(&Event::Sample(d)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn control_panel_and_unknown_charts_are_refused() {
        let (mut manager, mut panels, _rx) = setup();
        let err = manager.close("control", &mut panels).unwrap_err().to_string();
        assert!(err.contains("cannot be closed"));
        assert!(manager.close("machine", &mut panels).is_err());
        assert!(manager.open("bogus", &mut panels).is_err());
        assert!(!panels.registry.contains("bogus"));
    }
}
