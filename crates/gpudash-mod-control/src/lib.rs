use std::any::Any;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use gpudash_core::{
    command::ChartInfo,
    event::Event,
    module::{HudContribution, Module},
};
use gpudash_ui::renderer::HeroRenderer;

/// Landing panel listing every chart the dashboard can open.
///
/// Always present and cannot be closed. Tracks which charts are open from
/// [`Event::OpenCharts`].
pub struct ControlModule {
    catalog: &'static [ChartInfo],
    open: Vec<String>,
    source: String,
}

impl ControlModule {
    /// `source` describes where readings come from, for the header.
    pub fn new(catalog: &'static [ChartInfo], source: impl Into<String>) -> Self {
        Self {
            catalog,
            open: Vec::new(),
            source: source.into(),
        }
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open.iter().any(|o| o == id)
    }

    fn entry(&self, info: &ChartInfo) -> Line<'static> {
        let (marker, style) = if self.is_open(info.id) {
            ("open", Style::default().fg(Color::Green))
        } else {
            ("    ", Style::default().fg(Color::DarkGray))
        };
        Line::from(vec![
            Span::styled(
                format!(" [{}] ", info.key),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{:24}", info.title)),
            Span::styled(marker, style),
        ])
    }
}

impl Module for ControlModule {
    fn id(&self) -> &'static str {
        "control"
    }
    fn title(&self) -> &'static str {
        "Control"
    }

    fn handle_event(&mut self, ev: &Event) {
        if let Event::OpenCharts { ids } = ev {
            self.open = ids.clone();
        }
    }

    fn hud(&self) -> HudContribution {
        HudContribution {
            left_lines: vec![
                "1-4: open chart".into(),
                "Tab: next panel".into(),
                "`: console  q: quit".into(),
            ],
            right_lines: vec![
                format!("Charts open: {}", self.open.len()),
                self.source.clone(),
            ],
        }
    }

    fn closable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HeroRenderer for ControlModule {
    fn render_hero(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(" GPU DASHBOARD ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(inner);

        let header = Paragraph::new(Line::from(format!("Source: {}", self.source)))
            .alignment(Alignment::Center);
        f.render_widget(header, rows[0]);

        let lines: Vec<Line> = self.catalog.iter().map(|c| self.entry(c)).collect();
        f.render_widget(Paragraph::new(lines), rows[1]);
    }
}
