use std::any::Any;

use ratatui::{layout::Rect, Frame};

use gpudash_core::{
    event::Event,
    feed::LatestReading,
    module::{HudContribution, Module},
};
use gpudash_metrics::{reading::GpuUtilizationReading, InstanceId};
use gpudash_ui::{
    chart::utilization_color,
    format::{format_clock, format_percent},
    renderer::HeroRenderer,
};

use crate::bars::{render_bars, Bar};

pub const CHART_ID: &str = "gpu-utilization";

/// Current utilization of every GPU as horizontal bars.
pub struct GpuUtilizationModule {
    latest: LatestReading<GpuUtilizationReading>,
}

impl GpuUtilizationModule {
    pub fn new(generation: u64) -> Self {
        Self {
            latest: LatestReading::new(InstanceId::new(CHART_ID, generation)),
        }
    }

    pub fn latest(&self) -> Option<&GpuUtilizationReading> {
        self.latest.get()
    }

    fn bars(reading: &GpuUtilizationReading) -> Vec<Bar> {
        reading
            .gpu_utilization
            .iter()
            .enumerate()
            .map(|(i, &pct)| Bar {
                label: format!("GPU {i:<2} {:>6}", format_percent(pct)),
                ratio: pct / 100.0,
                color: utilization_color(pct),
            })
            .collect()
    }
}

impl Module for GpuUtilizationModule {
    fn id(&self) -> &'static str {
        CHART_ID
    }
    fn title(&self) -> &'static str {
        "GPU Utilization"
    }

    fn handle_event(&mut self, ev: &Event) {
        self.latest.handle(ev);
    }

    fn hud(&self) -> HudContribution {
        let right_lines = match self.latest.get() {
            Some(r) if !r.gpu_utilization.is_empty() => {
                let mean =
                    r.gpu_utilization.iter().sum::<f64>() / r.gpu_utilization.len() as f64;
                vec![
                    format!("GPUs: {}", r.gpu_utilization.len()),
                    format!("Mean: {}", format_percent(mean)),
                ]
            }
            Some(_) => vec!["GPUs: 0".into()],
            None => vec!["No samples yet".into()],
        };
        let mut left_lines = vec!["x: close".into()];
        if let Some(ts) = self.latest.received_at_ms() {
            left_lines.push(format!("Updated {}", format_clock(ts)));
        }
        HudContribution {
            left_lines,
            right_lines,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HeroRenderer for GpuUtilizationModule {
    fn render_hero(&self, f: &mut Frame, area: Rect) {
        let bars = self.latest.get().map(Self::bars);
        render_bars(f, area, "GPU Utilization", None, bars.as_deref());
    }
}
