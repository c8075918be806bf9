//! Drawing helpers shared by the chart panels.
//!
//! Time-series charts plot the visible slice of a chart's history with the
//! sample timestamp on the x axis. Bar panels colour each device through a
//! threshold scale.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use gpudash_metrics::{Reading, Snapshot};

use crate::format::{format_bytes, format_clock};

/// Line colours, cycled per device.
pub const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::LightBlue,
    Color::LightRed,
];

pub fn palette(i: usize) -> Color {
    PALETTE[i % PALETTE.len()]
}

/// Maps a value onto `colors` by ascending thresholds: values below
/// `thresholds[0]` get `colors[0]`, values at or above the last threshold
/// get the last colour. `colors` must be one longer than `thresholds`.
pub fn threshold_color(value: f64, thresholds: &[f64], colors: &[Color]) -> Color {
    let idx = thresholds.iter().take_while(|&&t| value >= t).count();
    colors
        .get(idx)
        .or_else(|| colors.last())
        .copied()
        .unwrap_or(Color::Reset)
}

const UTILIZATION_STEPS: [f64; 3] = [25.0, 50.0, 75.0];
const UTILIZATION_COLORS: [Color; 4] = [
    Color::Rgb(0xA7, 0xD9, 0x5A),
    Color::Rgb(0x76, 0xB9, 0x00),
    Color::Rgb(0x4D, 0x85, 0x00),
    Color::Rgb(0xFF, 0x57, 0x33),
];

/// Colour of a utilization bar, percent 0-100.
pub fn utilization_color(pct: f64) -> Color {
    threshold_color(pct, &UTILIZATION_STEPS, &UTILIZATION_COLORS)
}

const MEMORY_STEPS: [f64; 4] = [0.25, 0.45, 0.6, 0.75];
const MEMORY_COLORS: [Color; 5] = [
    Color::Rgb(0x2C, 0x7B, 0xB6),
    Color::Rgb(0xAB, 0xD9, 0xE9),
    Color::Rgb(0xFF, 0xFF, 0xBF),
    Color::Rgb(0xFD, 0xAE, 0x61),
    Color::Rgb(0xD7, 0x19, 0x1C),
];

/// Colour of a memory bar by its used/total ratio.
pub fn memory_color(ratio: f64) -> Color {
    threshold_color(ratio, &MEMORY_STEPS, &MEMORY_COLORS)
}

/// Clamp a ratio to 0.0-1.0 for gauges; NaN becomes 0.
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

/// `(timestamp_ms, value)` points; snapshots where `value` yields `None`
/// are left out.
pub fn points<T: Reading>(
    window: &[Snapshot<T>],
    value: impl Fn(&Snapshot<T>) -> Option<f64>,
) -> Vec<(f64, f64)> {
    window
        .iter()
        .filter_map(|s| value(s).map(|v| (s.timestamp_ms as f64, v)))
        .collect()
}

/// One named line on a time chart.
pub struct Trace {
    pub name: String,
    pub color: Color,
    pub points: Vec<(f64, f64)>,
}

/// How the y axis is bounded and labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YScale {
    /// Fixed 0-100.
    Percent,
    /// 0 to the largest plotted value, SI-byte labels.
    Bytes,
}

impl YScale {
    fn bounds(self, traces: &[Trace]) -> [f64; 2] {
        match self {
            YScale::Percent => [0.0, 100.0],
            YScale::Bytes => {
                let max = traces
                    .iter()
                    .flat_map(|t| t.points.iter().map(|&(_, y)| y))
                    .fold(0.0_f64, f64::max);
                [0.0, if max > 0.0 { max * 1.1 } else { 1.0 }]
            }
        }
    }

    fn label(self, v: f64) -> String {
        match self {
            YScale::Percent => format!("{v:.0}%"),
            YScale::Bytes => format_bytes(v),
        }
    }
}

fn x_bounds(traces: &[Trace]) -> Option<[f64; 2]> {
    let xs = traces.iter().flat_map(|t| t.points.iter().map(|&(x, _)| x));
    let (lo, hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    if lo.is_finite() {
        // A single sample still needs a non-empty range.
        Some([lo, hi.max(lo + 1.0)])
    } else {
        None
    }
}

/// Draw a line chart over wall-clock time, or a waiting message when no
/// trace has points yet.
pub fn render_time_chart(f: &mut Frame, area: Rect, title: &str, traces: &[Trace], scale: YScale) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} "));

    let Some([x_lo, x_hi]) = x_bounds(traces) else {
        let msg = Paragraph::new("Waiting for data...")
            .style(Style::default().fg(Color::Gray))
            .block(block);
        f.render_widget(msg, area);
        return;
    };
    let [y_lo, y_hi] = scale.bounds(traces);

    let datasets = traces
        .iter()
        .map(|t| {
            Dataset::default()
                .name(t.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(t.color))
                .data(&t.points)
        })
        .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([x_lo, x_hi])
                .labels(vec![
                    Span::raw(format_clock(x_lo as u64)),
                    Span::raw(format_clock(x_hi as u64)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([y_lo, y_hi])
                .labels(vec![
                    Span::raw(scale.label(y_lo)),
                    Span::raw(scale.label((y_lo + y_hi) / 2.0)),
                    Span::raw(scale.label(y_hi)),
                ]),
        );

    f.render_widget(chart, area);
}
