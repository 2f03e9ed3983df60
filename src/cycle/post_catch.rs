use std::time::Duration;

use super::FishingCycle;
use crate::screen_reader::fruit_ocr::DropScan;
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::settings::{secs, Settings};

/// Time for the drop notification to appear
const NOTIFICATION_DELAY: Duration = Duration::from_millis(100);

impl<S: FrameSource> FishingCycle<S> {
    /// Count the catch, handle a devil fruit drop and wait before the next cast
    pub fn post_catch(&mut self, s: &Settings) -> anyhow::Result<()> {
        let fish = self.counters.record_fish();
        tracing::info!("[CYCLE] Fish caught! Total: {}", fish);
        self.signals.reset_recovery_count();

        if s.auto_store_devil_fruit && self.scanner.is_some() {
            self.pause(NOTIFICATION_DELAY);
            let scan = match self.scanner.as_mut() {
                Some(scanner) => scanner.scan(s),
                None => DropScan::default(),
            };
            if scan.has_fruit {
                let fruits = self.counters.record_fruit();
                tracing::info!("[FRUIT] Devil fruit detected ({} this run), storing", fruits);
                self.store_devil_fruit(s)?;
                if scan.is_legendary {
                    tracing::info!("[FRUIT] Legendary fruit confirmed");
                    self.notifier.notify_devil_fruit(fish);
                }
            }
        }

        self.pause(secs(s.fish_end_delay));
        Ok(())
    }

    /// Put the fruit away: select it, click store, then confirm with shift/backspace/shift
    pub fn store_devil_fruit(&mut self, s: &Settings) -> anyhow::Result<bool> {
        let Some(point) = s.store_fruit_point else {
            tracing::warn!("[FRUIT] Auto store is enabled but no store fruit point is set");
            return Ok(false);
        };

        self.controls.tap_key(&s.devil_fruit_hotkey)?;
        if !self.pause(secs(s.store_fruit_hotkey_delay)) {
            return Ok(false);
        }

        self.controls.move_to(point)?;
        self.pause(secs(s.pre_cast_anti_detect_delay));
        self.controls.nudge()?;
        self.controls.click()?;
        if !self.pause(secs(s.store_fruit_click_delay)) {
            return Ok(false);
        }

        for (key, delay) in [
            ("shift", s.store_fruit_shift_delay),
            ("backspace", s.store_fruit_backspace_delay),
            ("shift", s.store_fruit_shift_delay),
        ] {
            self.controls.tap_key(key)?;
            if !self.pause(secs(delay)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
