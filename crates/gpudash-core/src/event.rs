use std::time::Instant;

use gpudash_metrics::Delivery;

#[derive(Debug, Clone)]
pub enum Event {
    Tick { now: Instant },
    Key(crossterm::event::KeyEvent),
    Resize { cols: u16, rows: u16 },
    ModuleActivated { id: String },
    ModuleDeactivated { id: String },
    /// A polled reading for the chart named in `instance.chart`.
    Sample(Delivery),
    /// Open the chart, or focus it if it is already open.
    OpenChart { id: String },
    CloseChart { id: String },
    TogglePause { id: String },
    /// The set of open charts changed; `ids` is the new set in tab order.
    OpenCharts { ids: Vec<String> },
    Quit,
}

impl Event {
    /// Short tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Tick { .. } => "tick",
            Event::Key(_) => "key",
            Event::Resize { .. } => "resize",
            Event::ModuleActivated { .. } => "activated",
            Event::ModuleDeactivated { .. } => "deactivated",
            Event::Sample(_) => "sample",
            Event::OpenChart { .. } => "open",
            Event::CloseChart { .. } => "close",
            Event::TogglePause { .. } => "pause",
            Event::OpenCharts { .. } => "charts",
            Event::Quit => "quit",
        }
    }
}
