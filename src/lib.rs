//! Haiku Fishing - auto fishing macro
//!
//! Detects the bite from a set of marker colors, then keeps the fish inside the
//! minigame bar by toggling the mouse button from a PD controller. A watchdog thread
//! restarts the cycle when it stalls.

pub mod control;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod input;
pub mod log_main;
pub mod screen_reader;
pub mod utils;
pub mod watchdog;

// Re-exports for convenience
pub use controller::{MacroController, MacroStatus, StartOutcome};
pub use cycle::{FishingCycle, Iteration};
pub use error::MacroError;
pub use screen_reader::{FrameSource, ScreenService};
pub use utils::{path::get_data_dir, settings::Settings};
