use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    widgets::{Block, Borders, Paragraph},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

use gpudash_metrics::PauseState;

use crate::layout::DashRects;

/// One entry of the tab strip in the top bar.
pub struct Tab<'a> {
    pub title: &'a str,
    pub active: bool,
}

pub struct ShellView<'a> {
    pub tabs: Vec<Tab<'a>>,
    pub status_line: &'a str,
    /// Pause state of the active panel, if it keeps history.
    pub pause: Option<PauseState>,
    pub hud_left: Vec<String>,
    pub hud_right: Vec<String>,
}

fn top_bar(view: &ShellView<'_>) -> Line<'static> {
    let mut spans = vec![Span::styled(
        " GPUDASH ",
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )];
    for tab in &view.tabs {
        spans.push(Span::raw(" "));
        let style = if tab.active {
            Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", tab.title), style));
    }
    spans.push(Span::styled(
        format!("  {}", view.status_line),
        Style::default().fg(Color::DarkGray),
    ));
    Line::from(spans)
}

fn status_badge(pause: Option<PauseState>) -> Paragraph<'static> {
    let (label, color) = match pause {
        Some(PauseState::Running) => ("RUNNING", Color::Green),
        Some(PauseState::Paused) => ("PAUSED", Color::Yellow),
        None => ("--", Color::DarkGray),
    };
    Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("STATE"))
}

pub fn render_shell(
    f: &mut Frame,
    rects: DashRects,
    view: ShellView<'_>,
    hero: impl FnOnce(&mut Frame, Rect),
) {
    f.render_widget(Paragraph::new(top_bar(&view)), rects.top);

    hero(f, rects.hero);

    let left_text = Text::from(view.hud_left.into_iter().map(Line::from).collect::<Vec<_>>());
    let left = Paragraph::new(left_text).block(Block::default().borders(Borders::ALL).title("KEYS"));
    f.render_widget(left, rects.hud_left);

    f.render_widget(status_badge(view.pause), rects.hud_status);

    let right_text = Text::from(view.hud_right.into_iter().map(Line::from).collect::<Vec<_>>());
    let right = Paragraph::new(right_text).block(Block::default().borders(Borders::ALL).title("LATEST"));
    f.render_widget(right, rects.hud_right);
}
