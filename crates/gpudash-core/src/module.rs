use std::any::Any;

use gpudash_metrics::PauseState;

use crate::event::Event;

/// Lines a panel contributes to the HUD strip below the hero area.
#[derive(Default)]
pub struct HudContribution {
    /// Key hints and panel status.
    pub left_lines: Vec<String>,
    /// Latest values.
    pub right_lines: Vec<String>,
}

/// A panel shown in the hero area: the control panel or one chart.
///
/// Panels are registered with [`crate::registry::ModuleRegistry`], which
/// routes events to them. Drawing lives in `gpudash_ui::renderer::HeroRenderer`
/// so this crate stays free of terminal types.
pub trait Module {
    /// Stable identifier, also the chart name used by console commands.
    fn id(&self) -> &'static str;

    /// Display name for the top bar and listings.
    fn title(&self) -> &'static str;

    fn handle_event(&mut self, _ev: &Event) {}

    fn hud(&self) -> HudContribution {
        HudContribution::default()
    }

    /// Pause state of a chart that keeps history; `None` for panels that
    /// cannot be paused.
    fn pause_state(&self) -> Option<PauseState> {
        None
    }

    /// Whether the user may close this panel.
    fn closable(&self) -> bool {
        true
    }

    /// Downcast hook for type-aware rendering in gpudash-ui.
    fn as_any(&self) -> &dyn Any;
}
