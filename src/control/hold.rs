//! Hold/release hysteresis for the minigame button

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
    /// Re-send the current state unchanged
    Reassert,
}

/// Emits a button transition only when the desired state changes, and re-asserts the
/// current state every `interval` in case the game dropped an event.
#[derive(Debug, Clone, Default)]
pub struct HoldGate {
    last_resend: Option<Instant>,
}

impl HoldGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_resend = None;
    }

    pub fn decide(
        &mut self,
        should_hold: bool,
        is_holding: bool,
        now: Instant,
        interval: Duration,
    ) -> Option<ButtonAction> {
        if should_hold != is_holding {
            self.last_resend = Some(now);
            return Some(if should_hold {
                ButtonAction::Press
            } else {
                ButtonAction::Release
            });
        }

        let due = match self.last_resend {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        };
        if due {
            self.last_resend = Some(now);
            Some(ButtonAction::Reassert)
        } else {
            None
        }
    }
}
