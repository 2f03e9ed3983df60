//! Closed-loop tracking during the minigame

use std::time::{Duration, Instant};

use super::{FishOutcome, FishingCycle};
use crate::control::{read_bar, BarReading, ButtonAction};
use crate::error::MacroError;
use crate::screen_reader::color::{color_ratio, PURE_BLACK};
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::settings::{secs, ScreenRegion, Settings};

impl<S: FrameSource> FishingCycle<S> {
    /// Track the bar until the marker has been gone for longer than the grace period
    pub fn fishing(&mut self, s: &Settings) -> anyhow::Result<FishOutcome> {
        let area = s.area_box.ok_or(MacroError::AreaUnset)?;
        let grace = secs(s.catch_grace_period);
        let resend = secs(s.state_resend_interval);

        self.pd.set_gains(s.pd_gains());
        self.pd.reset();
        self.hold.reset();
        self.controls.release_if_held();

        let mut marker_lost: Option<Instant> = None;

        while self.signals.should_continue() {
            let frame = self.sampler.capture(&area)?;
            let now = Instant::now();
            self.signals.touch_heartbeat();

            match read_bar(&frame, area.y1, s.gap_tolerance_multiplier) {
                BarReading::NoMarker => {
                    self.controls.release_if_held();
                    let lost_at = *marker_lost.get_or_insert(now);
                    if now.duration_since(lost_at) > grace {
                        if self.check_black_screen(&area, s.black_screen_threshold) {
                            self.clear_overlay()?;
                        }
                        return Ok(FishOutcome::Caught);
                    }
                }
                BarReading::NoBar => marker_lost = None,
                BarReading::Reading(m) => {
                    marker_lost = None;
                    let signal = self.pd.step(m.error() as f64, m.tracker_y as f64, now);
                    let should_hold = signal <= 0.0;
                    tracing::trace!(
                        "[FISH] setpoint {} tracker {} signal {:.3}",
                        m.setpoint_y,
                        m.tracker_y,
                        signal
                    );
                    let holding = self.controls.is_holding();
                    match self.hold.decide(should_hold, holding, now, resend) {
                        Some(ButtonAction::Press) => self.controls.press_button()?,
                        Some(ButtonAction::Release) => self.controls.release_button()?,
                        Some(ButtonAction::Reassert) => self.controls.reassert_button()?,
                        None => {}
                    }
                }
            }

            if !self.pause(secs(s.scan_loop_delay)) {
                break;
            }
        }

        self.controls.release_if_held();
        Ok(FishOutcome::Cancelled)
    }

    /// True when the area is mostly pure black. Capture failures count as not black.
    pub fn check_black_screen(&mut self, area: &ScreenRegion, threshold: f64) -> bool {
        match self.sampler.capture(area) {
            Ok(frame) => {
                let ratio = color_ratio(&frame, PURE_BLACK);
                let black = ratio >= threshold;
                if black {
                    tracing::info!("[FISH] Black screen detected ({:.1}% black)", ratio * 100.0);
                }
                black
            }
            Err(e) => {
                tracing::warn!("[FISH] Black screen check failed: {:#}", e);
                false
            }
        }
    }

    /// Dismiss the blank overlay with two space presses
    fn clear_overlay(&self) -> anyhow::Result<()> {
        tracing::info!("[FISH] Clearing overlay");
        self.controls.tap_key("space")?;
        self.pause(Duration::from_millis(500));
        self.controls.tap_key("space")?;
        self.pause(Duration::from_secs(1));
        Ok(())
    }
}
