//! Cast the line and wait for a bite

use std::time::{Duration, Instant};

use super::FishingCycle;
use crate::error::MacroError;
use crate::screen_reader::color::{contains_all, BITE_COLORS};
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::settings::{secs, Settings};

const AFTER_RIGHT_CLICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// All bite colors seen together
    Bite,
    /// Timed out, cast again
    Recast,
    /// Too many consecutive timeouts, the macro was stopped
    Halt,
    Cancelled,
}

impl<S: FrameSource> FishingCycle<S> {
    /// Cast, then poll the area until a bite or `recast_timeout`
    pub fn waiting(&mut self, s: &Settings) -> anyhow::Result<WaitOutcome> {
        if !self.cast(s)? {
            return Ok(WaitOutcome::Cancelled);
        }

        let area = s.area_box.ok_or(MacroError::AreaUnset)?;
        let timeout = secs(s.recast_timeout);
        let started = Instant::now();

        while self.signals.should_continue() && started.elapsed() < timeout {
            let frame = self.sampler.capture(&area)?;
            if contains_all(&frame, &BITE_COLORS) {
                tracing::info!("[WAIT] All colors detected, fish has bitten");
                self.counters.reset_recast_failures();
                return Ok(WaitOutcome::Bite);
            }
            self.signals.touch_heartbeat();
            if !self.pause(secs(s.scan_loop_delay)) {
                break;
            }
        }

        if !self.signals.should_continue() {
            return Ok(WaitOutcome::Cancelled);
        }

        let failures = self.counters.record_recast_failure();
        tracing::warn!(
            "[WAIT] Recast timeout, no bite detected ({}/{})",
            failures,
            s.max_recast_failures
        );
        if failures >= s.max_recast_failures {
            tracing::error!(
                "[WAIT] Stopping after {} consecutive recasts without a minigame",
                failures
            );
            self.notifier
                .notify_recast_failure(failures, self.counters.fish_count());
            self.controls.release_if_held();
            self.signals.set_running(false);
            return Ok(WaitOutcome::Halt);
        }
        Ok(WaitOutcome::Recast)
    }

    /// Scripted cast: reset the hotbar, select the rod, optionally the top bait, then
    /// hold the button over the water
    fn cast(&mut self, s: &Settings) -> anyhow::Result<bool> {
        let water = s.water_point.ok_or(MacroError::WaterPointUnset)?;

        self.controls.right_click()?;
        if !self.pause(AFTER_RIGHT_CLICK) {
            return Ok(false);
        }
        self.controls.tap_key(&s.anything_else_hotkey)?;
        if !self.pause(secs(s.rod_select_delay)) {
            return Ok(false);
        }
        self.controls.tap_key(&s.rod_hotkey)?;
        if !self.pause(secs(s.rod_select_delay)) {
            return Ok(false);
        }

        if s.auto_select_top_bait {
            match s.bait_point {
                Some(bait) => {
                    self.controls.move_to(bait)?;
                    if !self.pause(secs(s.cursor_anti_detect_delay)) {
                        return Ok(false);
                    }
                    self.controls.nudge()?;
                    self.controls.click()?;
                    if !self.pause(secs(s.auto_select_bait_delay)) {
                        return Ok(false);
                    }
                }
                None => tracing::warn!("[WAIT] Auto select top bait is on but no bait point is set"),
            }
        }

        self.controls.move_to(water)?;
        if !self.pause(secs(s.cursor_anti_detect_delay)) {
            return Ok(false);
        }
        self.controls.nudge()?;

        self.controls.press_button()?;
        let held = self.pause(secs(s.cast_hold_duration));
        self.controls.release_button()?;
        Ok(held)
    }
}
