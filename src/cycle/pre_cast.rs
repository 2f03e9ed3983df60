//! Bait purchase and crafting before each cast

use std::time::Duration;

use super::FishingCycle;
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::bot_state::CycleState;
use crate::utils::settings::{secs, Point, Settings};

/// Rounds of "+", fish, craft per selected bait
const CRAFT_ROUNDS: usize = 5;
/// Presses of the craft button per round
const CRAFT_PRESSES: usize = 15;
const SHIFT_SETTLE: Duration = Duration::from_millis(100);
const BAIT_SELECT_SETTLE: Duration = Duration::from_millis(300);
const BETWEEN_BAITS: Duration = Duration::from_millis(500);

/// Movement key in the opposite direction, `fallback` for keys without one
fn opposite_key(key: &str, fallback: &'static str) -> &'static str {
    match key.to_lowercase().as_str() {
        "w" => "s",
        "s" => "w",
        "a" => "d",
        "d" => "a",
        _ => fallback,
    }
}

impl<S: FrameSource> FishingCycle<S> {
    /// Buy bait when the purchase counter is due. Returns false when the iteration
    /// should not advance to the cast.
    pub fn pre_cast(&mut self, s: &Settings) -> anyhow::Result<bool> {
        if !self.signals.should_continue() {
            return Ok(false);
        }
        if !s.auto_buy_common_bait || self.counters.bait_loops() < s.loops_per_purchase {
            return Ok(true);
        }

        tracing::info!(
            "[PRE_CAST] Auto buying bait (loop {})",
            self.counters.bait_loops()
        );
        self.counters.set_bait_loops(0);

        if !self.purchase_bait(s)? {
            return Ok(false);
        }
        tracing::info!("[PRE_CAST] Bait purchase complete");
        self.notifier
            .notify_purchase(s.loops_per_purchase, self.counters.fish_count());

        if s.auto_craft_bait {
            tracing::info!("[PRE_CAST] Auto crafting bait after purchase");
            return self.craft_bait(s);
        }
        Ok(true)
    }

    fn purchase_bait(&mut self, s: &Settings) -> anyhow::Result<bool> {
        let (Some(left), Some(middle), Some(right)) = (s.left_point, s.middle_point, s.right_point)
        else {
            tracing::warn!("[PRE_CAST] Left, middle and right points must be set to buy bait");
            return Ok(false);
        };

        self.controls.tap_key("e")?;
        if !self.pause(secs(s.pre_cast_e_delay)) {
            return Ok(false);
        }

        let settle = s.pre_cast_anti_detect_delay;
        for point in [left, middle] {
            if !self.click_then_wait(point, settle, s.pre_cast_click_delay)? {
                return Ok(false);
            }
        }

        self.controls.type_text(&s.loops_per_purchase.to_string())?;
        if !self.pause(secs(s.pre_cast_type_delay)) {
            return Ok(false);
        }

        for point in [left, right, middle] {
            if !self.click_then_wait(point, settle, s.pre_cast_click_delay)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Walk to the crafting bench, craft the selected baits and walk back.
    /// The state is `crafting` for the duration and `pre_cast` afterwards.
    pub fn craft_bait(&mut self, s: &Settings) -> anyhow::Result<bool> {
        if !self.signals.should_continue() {
            return Ok(false);
        }
        let Some(craft) = s.craft_points() else {
            tracing::warn!("[CRAFT] All craft points must be set to use auto craft bait");
            return Ok(false);
        };

        let baits: Vec<(&str, Point)> = [
            ("Legendary", s.craft_leg_bait, s.leg_bait_point),
            ("Rare", s.craft_rare_bait, s.rare_bait_point),
        ]
        .into_iter()
        .filter_map(|(name, wanted, point)| if wanted { point.map(|p| (name, p)) } else { None })
        .collect();
        if baits.is_empty() {
            tracing::warn!("[CRAFT] Select at least one bait type and set its point");
            return Ok(false);
        }

        let (Some(left), Some(middle)) = (s.left_point, s.middle_point) else {
            tracing::warn!("[CRAFT] Left and middle points must be set to craft bait");
            return Ok(false);
        };

        self.signals.enter_state(CycleState::Crafting);
        let result = self.craft_sequence(s, craft, &baits, left, middle);
        self.signals.enter_state(CycleState::PreCast);

        match result {
            Ok(true) => {
                tracing::info!("[CRAFT] Bait crafting completed");
                self.counters.reset_recast_failures();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                tracing::warn!("[CRAFT] Error during bait crafting: {:#}", e);
                Ok(false)
            }
        }
    }

    fn craft_sequence(
        &mut self,
        s: &Settings,
        craft: [Point; 4],
        baits: &[(&str, Point)],
        left: Point,
        middle: Point,
    ) -> anyhow::Result<bool> {
        let settle = s.cursor_anti_detect_delay;

        // Out to the bench with shift lock on
        self.controls.tap_key("shift")?;
        self.pause(SHIFT_SETTLE);
        self.signals.touch_heartbeat();
        self.controls
            .hold_key(&s.craft_nav_key_1, secs(s.craft_nav_duration_1))?;
        if !self.pause(secs(s.craft_nav_wait_delay)) {
            return Ok(false);
        }
        self.controls
            .hold_key(&s.craft_nav_key_2, secs(s.craft_nav_duration_2))?;
        if !self.pause(secs(s.craft_nav_wait_delay)) {
            return Ok(false);
        }
        self.controls.tap_key("shift")?;
        self.pause(SHIFT_SETTLE);
        self.signals.touch_heartbeat();

        self.controls.tap_key("t")?;
        if !self.pause(secs(s.craft_t_press_delay)) {
            return Ok(false);
        }
        for point in [left, middle] {
            if !self.click_then_wait(point, settle, s.craft_click_delay)? {
                return Ok(false);
            }
        }

        for (i, (name, bait)) in baits.iter().enumerate() {
            if i > 0 && !self.pause(BETWEEN_BAITS) {
                return Ok(false);
            }
            self.signals.touch_heartbeat();
            tracing::info!("[CRAFT] Crafting {} bait", name);
            if !self.click_then_wait(*bait, settle, s.craft_click_delay)?
                || !self.pause(BAIT_SELECT_SETTLE)
            {
                return Ok(false);
            }

            for _ in 0..CRAFT_ROUNDS {
                if !self.signals.should_continue() {
                    return Ok(false);
                }
                self.signals.touch_heartbeat();
                for button in [craft[0], craft[1]] {
                    if !self.click_then_wait(button, settle, s.craft_button_delay)? {
                        return Ok(false);
                    }
                }
                for _ in 0..CRAFT_PRESSES {
                    if !self.click_then_wait(craft[2], settle, s.craft_craft_button_delay)? {
                        return Ok(false);
                    }
                }
                if !self.pause(secs(s.craft_sequence_delay)) {
                    return Ok(false);
                }
            }
        }

        if !self.click_then_wait(craft[3], settle, s.craft_exit_delay)? {
            return Ok(false);
        }

        // And back, reversing the two moves
        self.controls.tap_key("shift")?;
        self.pause(SHIFT_SETTLE);
        self.signals.touch_heartbeat();
        self.controls.hold_key(
            opposite_key(&s.craft_nav_key_2, "s"),
            secs(s.craft_nav_duration_2),
        )?;
        if !self.pause(secs(s.craft_nav_wait_delay)) {
            return Ok(false);
        }
        self.controls.hold_key(
            opposite_key(&s.craft_nav_key_1, "a"),
            secs(s.craft_nav_duration_1),
        )?;
        self.controls.tap_key("shift")?;
        self.pause(SHIFT_SETTLE);
        Ok(true)
    }
}
