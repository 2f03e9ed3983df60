//! Shared state, configuration and notification helpers

pub mod bot_state;
pub mod keybinds;
pub mod path;
pub mod settings;
pub mod webhook;

pub use bot_state::{now_ms, CycleState, RunCounters, SharedSignals};
pub use settings::{Point, ScreenRegion, Settings};
