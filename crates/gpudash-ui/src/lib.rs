//! TUI rendering layer for gpudash.
//!
//! Provides the dashboard layout, shell chrome, console overlay and the chart
//! helpers shared by every panel. All rendering uses [`ratatui`]; this crate
//! owns the visual presentation while [`gpudash_core`] owns the state.

pub mod chart;
pub mod console;
pub mod format;
pub mod layout;
pub mod renderer;
pub mod shell;
