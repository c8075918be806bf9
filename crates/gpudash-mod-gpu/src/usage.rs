use std::any::Any;

use ratatui::{layout::Rect, Frame};

use gpudash_core::{
    event::Event,
    feed::LatestReading,
    module::{HudContribution, Module},
};
use gpudash_metrics::{reading::GpuUsageReading, InstanceId};
use gpudash_ui::{
    chart::memory_color,
    format::{format_bytes, format_clock},
    renderer::HeroRenderer,
};

use crate::bars::{render_bars, Bar};

pub const CHART_ID: &str = "gpu-usage";

/// Memory in use on every GPU, bars scaled to the largest card.
pub struct GpuUsageModule {
    latest: LatestReading<GpuUsageReading>,
}

impl GpuUsageModule {
    pub fn new(generation: u64) -> Self {
        Self {
            latest: LatestReading::new(InstanceId::new(CHART_ID, generation)),
        }
    }

    pub fn latest(&self) -> Option<&GpuUsageReading> {
        self.latest.get()
    }

    fn bars(reading: &GpuUsageReading) -> Vec<Bar> {
        let scale = reading.max_total();
        reading
            .memory_usage
            .iter()
            .zip(&reading.total_memory)
            .enumerate()
            .map(|(i, (&used, &total))| {
                let fill = if total > 0.0 { used / total } else { 0.0 };
                Bar {
                    label: format!(
                        "GPU {i:<2} {} / {}",
                        format_bytes(used),
                        format_bytes(total)
                    ),
                    ratio: if scale > 0.0 { used / scale } else { 0.0 },
                    color: memory_color(fill),
                }
            })
            .collect()
    }

    fn header(reading: &GpuUsageReading) -> String {
        format!("Total used: {}", format_bytes(reading.used_sum()))
    }
}

impl Module for GpuUsageModule {
    fn id(&self) -> &'static str {
        CHART_ID
    }
    fn title(&self) -> &'static str {
        "GPU Memory Usage"
    }

    fn handle_event(&mut self, ev: &Event) {
        self.latest.handle(ev);
    }

    fn hud(&self) -> HudContribution {
        let right_lines = match self.latest.get() {
            Some(r) => vec![
                Self::header(r),
                format!("Installed: {}", format_bytes(r.total_memory.iter().sum())),
            ],
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

impl HeroRenderer for GpuUsageModule {
    fn render_hero(&self, f: &mut Frame, area: Rect) {
        let reading = self.latest.get();
        let bars = reading.map(Self::bars);
        render_bars(
            f,
            area,
            "GPU Memory Usage",
            reading.map(Self::header),
            bars.as_deref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::render_text;
    use gpudash_metrics::{Delivery, Reading};

    fn reading() -> GpuUsageReading {
        GpuUsageReading {
            memory_usage: vec![4e9, 12e9],
            total_memory: vec![8e9, 16e9],
        }
    }

    #[test]
    fn bars_scale_to_largest_card() {
        let bars = GpuUsageModule::bars(&reading());
        assert!((bars[0].ratio - 0.25).abs() < 1e-9);
        assert!((bars[1].ratio - 0.75).abs() < 1e-9);
        // 4/8 and 12/16 of their own card.
        assert_eq!(bars[0].color, memory_color(0.5));
        assert_eq!(bars[1].color, memory_color(0.75));
    }

    #[test]
    fn zero_totals_do_not_divide_by_zero() {
        let bars = GpuUsageModule::bars(&GpuUsageReading {
            memory_usage: vec![0.0],
            total_memory: vec![0.0],
        });
        assert_eq!(bars[0].ratio, 0.0);
    }

    #[test]
    fn renders_summed_header() {
        let mut module = GpuUsageModule::new(1);
        module.handle_event(&Event::Sample(Delivery {
            instance: InstanceId::new(CHART_ID, 1),
            received_at_ms: 0,
            reading: reading().into_any(),
        }));
        let text = render_text(|f| module.render_hero(f, f.area()));
        assert!(text.contains("Total used: 16.0 GB"));
        assert!(text.contains("GPU 1  12.0 GB / 16.0 GB"));
        assert_eq!(module.hud().right_lines[1], "Installed: 24.0 GB");
    }
}
