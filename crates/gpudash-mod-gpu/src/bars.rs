use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, LineGauge, Paragraph},
    Frame,
};

use gpudash_ui::chart::clamp_ratio;

/// One device row of a bar panel.
pub(crate) struct Bar {
    pub label: String,
    pub ratio: f64,
    pub color: Color,
}

/// Draw a header line and one gauge per device.
///
/// Rows that do not fit are left out; `None` bars means no reading yet.
pub(crate) fn render_bars(
    f: &mut Frame,
    area: Rect,
    title: &str,
    header: Option<String>,
    bars: Option<&[Bar]>,
) {
    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let Some(bars) = bars else {
        let msg = Paragraph::new("Waiting for data...").style(Style::default().fg(Color::Gray));
        f.render_widget(msg, inner);
        return;
    };
    if bars.is_empty() {
        f.render_widget(Paragraph::new("No GPUs reported"), inner);
        return;
    }

    let header_rows = u16::from(header.is_some()) * 2;
    let rows = Layout::vertical([Constraint::Length(header_rows), Constraint::Min(0)]).split(inner);
    if let Some(header) = header {
        f.render_widget(Paragraph::new(Line::from(header)), rows[0]);
    }

    let body = rows[1];
    let visible = bars.len().min(body.height as usize);
    let slots = Layout::vertical(vec![Constraint::Length(1); visible]).split(body);
    for (bar, slot) in bars.iter().zip(slots.iter()) {
        let gauge = LineGauge::default()
            .ratio(clamp_ratio(bar.ratio))
            .label(bar.label.clone())
            .filled_style(Style::default().fg(bar.color))
            .unfilled_style(Style::default().fg(Color::DarkGray));
        f.render_widget(gauge, *slot);
    }
}

#[cfg(test)]
pub(crate) fn render_text(draw: impl FnOnce(&mut Frame)) -> String {
    use ratatui::{backend::TestBackend, Terminal};

    let backend = TestBackend::new(80, 12);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(draw).unwrap();
    terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|c| c.symbol().to_string())
        .collect()
}
