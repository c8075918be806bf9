use std::any::Any;

use ratatui::{layout::Rect, Frame};

use gpudash_core::{
    event::Event,
    feed::ChartFeed,
    module::{HudContribution, Module},
    view::HistoryView,
};
use gpudash_metrics::{reading::MachineReading, FlushPolicy, InstanceId, PauseState};
use gpudash_ui::{
    format::{format_bytes, format_percent},
    renderer::HeroRenderer,
};

mod render;

pub const CHART_ID: &str = "machine";

/// Time-series panel for host CPU, memory, disk and network.
pub struct MachineModule {
    feed: ChartFeed<MachineReading>,
    view: HistoryView,
}

impl MachineModule {
    /// `window` is how many samples are drawn at once.
    pub fn new(generation: u64, policy: FlushPolicy, window: usize) -> Self {
        Self {
            feed: ChartFeed::new(InstanceId::new(CHART_ID, generation), policy),
            view: HistoryView::new(window),
        }
    }

    pub fn feed(&self) -> &ChartFeed<MachineReading> {
        &self.feed
    }

    pub fn view(&self) -> &HistoryView {
        &self.view
    }
}

impl Module for MachineModule {
    fn id(&self) -> &'static str {
        CHART_ID
    }
    fn title(&self) -> &'static str {
        "Machine Resources"
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
                let rates = snap.rates.unwrap_or_default();
                vec![
                    format!("CPU  {}", format_percent(r.cpu_utilization)),
                    format!("MEM  {}", format_bytes(r.memory_usage as f64)),
                    format!(
                        "DISK r {} / w {}",
                        format_bytes(rates.disk_read_current as f64),
                        format_bytes(rates.disk_write_current as f64)
                    ),
                    format!(
                        "NET  rx {} / tx {}",
                        format_bytes(rates.network_read_current as f64),
                        format_bytes(rates.network_write_current as f64)
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

impl HeroRenderer for MachineModule {
    fn render_hero(&self, f: &mut Frame, area: Rect) {
        render::render_hero_content(f, area, self.view.slice(self.feed.history().series()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use gpudash_metrics::{Delivery, Reading};

    fn reading(disk_read: u64) -> MachineReading {
        MachineReading {
            time: None,
            cpu_utilization: 12.0,
            memory_usage: 4_200_000_000,
            disk_read,
            disk_write: 0,
            network_read: 0,
            network_write: 0,
        }
    }

    fn sample(generation: u64, ts: u64, disk_read: u64) -> Event {
        Event::Sample(Delivery {
            instance: InstanceId::new(CHART_ID, generation),
            received_at_ms: ts,
            reading: reading(disk_read).into_any(),
        })
    }

    fn disk_rates(module: &MachineModule) -> Vec<Option<u64>> {
        module
            .feed()
            .history()
            .series()
            .iter()
            .map(|s| s.rates.map(|r| r.disk_read_current))
            .collect()
    }

    #[test]
    fn rates_follow_counter_deltas() {
        let mut module = MachineModule::new(1, FlushPolicy::Always, 60);
        for (i, v) in [100, 140, 140, 200].into_iter().enumerate() {
            module.handle_event(&sample(1, i as u64 * 1000, v));
        }
        assert_eq!(disk_rates(&module), vec![None, Some(40), Some(0), Some(60)]);
    }

    #[test]
    fn stale_generation_is_a_no_op() {
        let mut module = MachineModule::new(2, FlushPolicy::Always, 60);
        module.handle_event(&sample(1, 0, 100));
        assert!(module.feed().history().series().is_empty());
        assert_eq!(module.hud().right_lines, vec!["No samples yet".to_string()]);
    }

    #[test]
    fn pause_shows_buffer_in_hud() {
        let mut module = MachineModule::new(1, FlushPolicy::Always, 60);
        module.handle_event(&sample(1, 0, 100));
        module.handle_event(&Event::TogglePause { id: CHART_ID.into() });
        module.handle_event(&sample(1, 1000, 150));
        module.handle_event(&sample(1, 2000, 180));

        assert_eq!(module.pause_state(), Some(PauseState::Paused));
        assert!(module.hud().left_lines.contains(&"Buffered: 2".to_string()));
        assert_eq!(module.feed().history().series().len(), 1);

        module.handle_event(&Event::TogglePause { id: CHART_ID.into() });
        module.handle_event(&sample(1, 3000, 200));
        // Buffered readings were measured against the pre-pause tail.
        assert_eq!(disk_rates(&module), vec![None, Some(50), Some(80), Some(100)]);
    }

    #[test]
    fn min_batch_discard_is_reported() {
        let mut module = MachineModule::new(1, FlushPolicy::MinBatch(2), 60);
        module.handle_event(&sample(1, 0, 100));
        module.handle_event(&Event::TogglePause { id: CHART_ID.into() });
        module.handle_event(&sample(1, 1000, 150));
        module.handle_event(&Event::TogglePause { id: CHART_ID.into() });
        module.handle_event(&sample(1, 2000, 200));

        assert_eq!(module.feed().history().series().len(), 2);
        assert!(module.hud().left_lines.contains(&"Discarded: 1".to_string()));
    }

    fn press(module: &mut MachineModule, code: KeyCode) {
        module.handle_event(&Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn visible_reads(module: &MachineModule) -> Vec<u64> {
        module
            .view()
            .slice(module.feed().history().series())
            .iter()
            .map(|s| s.reading.disk_read)
            .collect()
    }

    #[test]
    fn keys_pan_through_history() {
        let mut module = MachineModule::new(1, FlushPolicy::Always, 3);
        for i in 0..8 {
            module.handle_event(&sample(1, i * 1000, i * 10));
        }
        assert_eq!(visible_reads(&module), vec![50, 60, 70]);
        assert!(module.hud().left_lines.contains(&"View: live, last 3 of 8".to_string()));

        press(&mut module, KeyCode::Left);
        press(&mut module, KeyCode::Left);
        assert_eq!(visible_reads(&module), vec![30, 40, 50]);
        assert!(module.hud().left_lines.contains(&"View: 4-6 of 8".to_string()));

        // New samples do not move a view that was panned back.
        module.handle_event(&sample(1, 8000, 80));
        assert_eq!(visible_reads(&module), vec![30, 40, 50]);

        press(&mut module, KeyCode::Char('['));
        press(&mut module, KeyCode::Char('['));
        assert_eq!(visible_reads(&module), vec![0, 10, 20]);

        press(&mut module, KeyCode::End);
        assert_eq!(visible_reads(&module), vec![60, 70, 80]);
    }

    #[test]
    fn hud_shows_latest_values() {
        let mut module = MachineModule::new(1, FlushPolicy::Always, 60);
        module.handle_event(&sample(1, 0, 1_000));
        module.handle_event(&sample(1, 1000, 1_501_000));
        let right = module.hud().right_lines;
        assert_eq!(right[0], "CPU  12.0%");
        assert_eq!(right[1], "MEM  4.2 GB");
        assert_eq!(right[2], "DISK r 1.5 MB / w 0 B");
    }
}
