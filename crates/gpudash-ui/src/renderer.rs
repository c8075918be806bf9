use ratatui::{Frame, layout::Rect};

/// Trait for panels that draw into the hero (main) area.
///
/// Implement this alongside [`gpudash_core::module::Module`]. The app wires
/// renderers to panels at registration time via [`std::any::Any`]
/// downcasting, so no rendering types leak into gpudash-core.
pub trait HeroRenderer {
    /// Called each frame while this panel is active.
    fn render_hero(&self, f: &mut Frame, area: Rect);
}
