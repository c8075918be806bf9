//! Core infrastructure for the gpudash runtime.
//!
//! Shared by the application shell and every chart panel: the event bus,
//! the registry of open panels, the drop-down console with its command
//! set, and the logging subsystem.

pub mod bus;
pub mod command;
pub mod console;
pub mod event;
pub mod feed;
pub mod logging;
pub mod module;
pub mod registry;
pub mod state;
pub mod view;
