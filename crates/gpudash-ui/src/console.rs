use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use gpudash_core::console::Console;
use gpudash_core::logging::{LogEntry, LogLevel};

/// Sample counters shown in the console title bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCounters {
    pub delivered: u64,
    pub dropped: u64,
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Error => Color::Red,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Info => Color::Green,
        LogLevel::Debug => Color::Cyan,
        LogLevel::Trace => Color::DarkGray,
    }
}

fn log_line(entry: &LogEntry) -> Line<'_> {
    Line::from(vec![
        Span::styled(
            format!(" {:5} ", entry.level),
            Style::default()
                .fg(level_color(entry.level))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("[{}] ", entry.target),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(entry.message.as_str()),
    ])
}

/// Index range of the log entries visible in `height` rows, `offset`
/// rows up from the newest.
fn visible_range(total: usize, height: usize, offset: usize) -> std::ops::Range<usize> {
    let end = total.saturating_sub(offset);
    end.saturating_sub(height)..end
}

/// Draw the console overlay over the top half of `area`.
///
/// The title bar carries the sample counters, below it the log and the
/// command line with the terminal cursor placed in it.
pub fn render_console(f: &mut Frame, area: Rect, console: &Console, counters: SampleCounters) {
    let height = (area.height / 2).max(3).min(area.height);
    if height < 3 {
        return;
    }
    let overlay = Rect { height, ..area };
    f.render_widget(Clear, overlay);

    let [title_row, log_area, input_row] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(overlay);

    let title = Line::from(vec![
        Span::styled(
            " CONSOLE ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  samples: {} delivered, {} dropped  ",
            counters.delivered, counters.dropped
        )),
        Span::styled("~ to close", Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(
        Paragraph::new(title).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        title_row,
    );

    let entries = console.log_lines();
    let range = visible_range(
        entries.len(),
        log_area.height as usize,
        console.scroll_offset(),
    );
    let lines: Vec<Line> = entries.range(range).map(log_line).collect();
    f.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::LEFT | Borders::RIGHT)
                    .style(Style::default().bg(Color::Black)),
            )
            .wrap(Wrap { trim: false }),
        log_area,
    );

    let prompt = Line::from(vec![
        Span::styled(
            "> ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(console.input_buffer.as_str()),
    ]);
    f.render_widget(
        Paragraph::new(prompt).style(Style::default().bg(Color::Black).fg(Color::White)),
        input_row,
    );

    let col = console.input_buffer[..console.cursor_pos].width() as u16;
    f.set_cursor_position((input_row.x + 2 + col, input_row.y));
}
