use std::time::{Duration, Instant};

/// Process-wide bookkeeping of the dashboard shell.
pub struct AppState {
    pub started_at: Instant,
    pub status_line: String,
    /// Readings routed to an open chart.
    pub delivered: u64,
    /// Readings that arrived for a chart that had already been closed.
    pub dropped: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            delivered: 0,
            dropped: 0,
            status_line: "WAITING FOR FIRST SAMPLE".to_string(),
        }
    }
}

/// Elapsed time as `HH:MM:SS`, with a day count once past 24 hours.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 day {clock}"),
        n => format!("{n} days {clock}"),
    }
}
