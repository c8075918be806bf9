use std::any::Any;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Color,
    Frame,
};

use gpudash_core::{
    event::Event,
    feed::ChartFeed,
    module::{HudContribution, Module},
    view::HistoryView,
};
use gpudash_metrics::{
    reading::{GpuDevice, GpuResourceReading},
    FlushPolicy, InstanceId, PauseState, Snapshot,
};
use gpudash_ui::{
    chart::{palette, points, render_time_chart, Trace, YScale},
    format::{format_bytes, format_percent},
    renderer::HeroRenderer,
};

pub const CHART_ID: &str = "gpu-resource";

/// Per-device utilization and memory over time, plus PCIe throughput.
pub struct GpuResourceModule {
    feed: ChartFeed<GpuResourceReading>,
    view: HistoryView,
}

impl GpuResourceModule {
    pub fn new(generation: u64, policy: FlushPolicy, window: usize) -> Self {
        Self {
            feed: ChartFeed::new(InstanceId::new(CHART_ID, generation), policy),
            view: HistoryView::new(window),
        }
    }

    pub fn feed(&self) -> &ChartFeed<GpuResourceReading> {
        &self.feed
    }

    fn visible(&self) -> &[Snapshot<GpuResourceReading>] {
        self.view.slice(self.feed.history().series())
    }
}

/// One trace per device, `value` picking the plotted field.
fn device_traces(
    window: &[Snapshot<GpuResourceReading>],
    value: impl Fn(&GpuDevice) -> f64,
) -> Vec<Trace> {
    let devices = window.first().map_or(0, |s| s.reading.gpu_devices.len());
    (0..devices)
        .map(|i| Trace {
            name: format!("GPU {i}"),
            color: palette(i),
            points: points(window, |s| s.reading.gpu_devices.get(i).map(&value)),
        })
        .collect()
}

impl Module for GpuResourceModule {
    fn id(&self) -> &'static str {
        CHART_ID
    }
    fn title(&self) -> &'static str {
        "GPU Resources"
    }

    fn handle_event(&mut self, ev: &Event) {
        let len = self.feed.history().series().len();
        if !self.view.handle_event(ev, len) {
            self.feed.handle(ev);
        }
    }

    fn hud(&self) -> HudContribution {
        let history = self.feed.history();
        let mut left_lines = vec![
            "p: pause/resume  x: close".into(),
            "Left/Right [ ]: pan  End: live".into(),
            self.view.describe(history.series().len()),
        ];
        if history.is_paused() {
            left_lines.push(format!("Buffered: {}", history.pending_len()));
        }
        if history.discarded() > 0 {
            left_lines.push(format!("Discarded: {}", history.discarded()));
        }

        let right_lines = match history.latest() {
            Some(snap) => {
                let r = &snap.reading;
                vec![
                    format!(
                        "GPUs {}  util {}",
                        r.gpu_devices.len(),
                        format_percent(r.gpu_utilization_total)
                    ),
                    format!("MEM  {}", format_bytes(r.gpu_memory_total)),
                    format!(
                        "PCIe rx {} / tx {}",
                        format_bytes(r.rx_total),
                        format_bytes(r.tx_total)
                    ),
                ]
            }
            None => vec!["No samples yet".into()],
        };

        HudContribution {
            left_lines,
            right_lines,
        }
    }

    fn pause_state(&self) -> Option<PauseState> {
        Some(self.feed.state())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HeroRenderer for GpuResourceModule {
    fn render_hero(&self, f: &mut Frame, area: Rect) {
        let window = self.visible();
        let rows = Layout::vertical([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

        let util = device_traces(window, |d| d.utilization);
        render_time_chart(f, rows[0], "GPU Utilization per Device", &util, YScale::Percent);

        let mem = device_traces(window, |d| d.memory);
        render_time_chart(f, rows[1], "GPU Memory per Device", &mem, YScale::Bytes);

        let pcie = [
            Trace {
                name: "rx".into(),
                color: Color::LightBlue,
                points: points(window, |s| Some(s.reading.rx_total)),
            },
            Trace {
                name: "tx".into(),
                color: Color::LightRed,
                points: points(window, |s| Some(s.reading.tx_total)),
            },
        ];
        render_time_chart(f, rows[2], "PCIe Throughput", &pcie, YScale::Bytes);
    }
}
