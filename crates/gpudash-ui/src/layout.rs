use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Screen regions of the dashboard shell.
#[derive(Debug, Clone, Copy)]
pub struct DashRects {
    pub top: Rect,
    pub hero: Rect,
    pub hud: Rect,
    pub hud_left: Rect,
    pub hud_status: Rect,
    pub hud_right: Rect,
}

/// Top bar, hero area, and a HUD strip split into key hints, the active
/// chart's status box and its latest values.
pub fn dashboard_layout(area: Rect, hud_height: u16, status_width: u16) -> DashRects {
    let hud_height = hud_height.max(5).min(area.height.saturating_sub(2).max(5));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),          // top bar
            Constraint::Min(1),             // hero
            Constraint::Length(hud_height), // hud
        ])
        .split(area);

    let hud = chunks[2];
    let status_width = status_width.min(hud.width.saturating_sub(2).max(10));

    let hud_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(status_width),
            Constraint::Percentage(45),
        ])
        .split(hud);

    DashRects {
        top: chunks[0],
        hero: chunks[1],
        hud,
        hud_left: hud_cols[0],
        hud_status: hud_cols[1],
        hud_right: hud_cols[2],
    }
}
