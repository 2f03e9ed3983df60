//! Settings document for the macro
//!
//! The document is a flat JSON object. Every key is optional: missing keys take the
//! built-in defaults (screen points scaled to the current resolution) and unknown keys
//! are ignored.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::control::pd::PdGains;
use crate::error::MacroError;

/// Reference resolution used when the real screen size is unknown
pub const DEFAULT_SCREEN: (i32, i32) = (1920, 1080);

/// A screen coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn scaled(screen: (i32, i32), fx: f64, fy: f64) -> Self {
        Self {
            x: (screen.0 as f64 * fx) as i32,
            y: (screen.1 as f64 * fy) as i32,
        }
    }
}

/// Rectangular screen area, `x2`/`y2` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl ScreenRegion {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }

    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

impl fmt::Display for ScreenRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Area expressed as fractions of the screen size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaFractions {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl AreaFractions {
    pub fn to_region(&self, screen: (i32, i32)) -> ScreenRegion {
        let (w, h) = (screen.0 as f64, screen.1 as f64);
        ScreenRegion::new(
            (w * self.x1) as i32,
            (h * self.y1) as i32,
            (w * self.x2) as i32,
            (h * self.y2) as i32,
        )
    }
}

/// Global hotkey bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    pub start_stop: String,
    pub change_area: String,
    pub exit: String,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            start_stop: "f1".to_string(),
            change_area: "f2".to_string(),
            exit: "f3".to_string(),
        }
    }
}

/// Every tunable of the macro. Timings are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Calibrated screen positions
    pub water_point: Option<Point>,
    pub area_box: Option<ScreenRegion>,
    pub ocr_area_box_percentages: AreaFractions,
    pub left_point: Option<Point>,
    pub middle_point: Option<Point>,
    pub right_point: Option<Point>,
    pub bait_point: Option<Point>,
    pub store_fruit_point: Option<Point>,
    pub craft_point_1: Option<Point>,
    pub craft_point_2: Option<Point>,
    pub craft_point_3: Option<Point>,
    pub craft_point_4: Option<Point>,
    pub leg_bait_point: Option<Point>,
    pub rare_bait_point: Option<Point>,

    // Key bindings
    pub hotkeys: Hotkeys,
    pub rod_hotkey: String,
    pub anything_else_hotkey: String,
    pub devil_fruit_hotkey: String,

    // PD controller
    pub kp: f64,
    pub kd: f64,
    pub pd_clamp: f64,
    pub pd_approaching_damping: f64,
    pub pd_chasing_damping: f64,
    pub gap_tolerance_multiplier: f64,

    // Cycle timing
    pub cast_hold_duration: f64,
    pub recast_timeout: f64,
    pub max_recast_failures: u32,
    pub fish_end_delay: f64,
    pub catch_grace_period: f64,
    pub scan_loop_delay: f64,
    pub state_resend_interval: f64,
    pub black_screen_threshold: f64,
    pub rod_select_delay: f64,
    pub cursor_anti_detect_delay: f64,
    pub auto_select_bait_delay: f64,

    // Feature toggles
    pub auto_buy_common_bait: bool,
    pub auto_select_top_bait: bool,
    pub auto_store_devil_fruit: bool,
    pub auto_craft_bait: bool,
    pub craft_leg_bait: bool,
    pub craft_rare_bait: bool,

    // Bait purchase
    pub loops_per_purchase: u32,
    pub pre_cast_e_delay: f64,
    pub pre_cast_click_delay: f64,
    pub pre_cast_type_delay: f64,
    pub pre_cast_anti_detect_delay: f64,

    // Bait crafting
    pub craft_nav_key_1: String,
    pub craft_nav_duration_1: f64,
    pub craft_nav_key_2: String,
    pub craft_nav_duration_2: f64,
    pub craft_nav_wait_delay: f64,
    pub craft_t_press_delay: f64,
    pub craft_click_delay: f64,
    pub craft_button_delay: f64,
    pub craft_craft_button_delay: f64,
    pub craft_sequence_delay: f64,
    pub craft_exit_delay: f64,

    // Devil fruit storage
    pub store_fruit_hotkey_delay: f64,
    pub store_fruit_click_delay: f64,
    pub store_fruit_shift_delay: f64,
    pub store_fruit_backspace_delay: f64,

    // Webhook
    pub webhook_enabled: bool,
    pub webhook_url: String,
    pub discord_user_id: String,
    pub webhook_notify_devil_fruit: bool,
    pub webhook_notify_purchase: bool,
    pub webhook_notify_recovery: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_screen(DEFAULT_SCREEN)
    }
}

impl Settings {
    /// Defaults with calibration points scaled to the given screen size
    pub fn for_screen(screen: (i32, i32)) -> Self {
        let mut settings = Self {
            water_point: Some(Point::scaled(screen, 0.42070, 0.15347)),
            area_box: Some(ScreenRegion::new(
                (screen.0 as f64 * 0.52461) as i32,
                (screen.1 as f64 * 0.29167) as i32,
                (screen.0 as f64 * 0.68477) as i32,
                (screen.1 as f64 * 0.79097) as i32,
            )),
            ocr_area_box_percentages: AreaFractions {
                x1: 0.3115,
                y1: 0.0602,
                x2: 0.6839,
                y2: 0.2,
            },
            left_point: Some(Point::scaled(screen, 0.41133, 0.90694)),
            middle_point: Some(Point::scaled(screen, 0.50078, 0.90556)),
            right_point: Some(Point::scaled(screen, 0.59023, 0.90486)),
            bait_point: Some(Point::scaled(screen, 0.50078, 0.74028)),
            store_fruit_point: None,
            craft_point_1: None,
            craft_point_2: None,
            craft_point_3: None,
            craft_point_4: None,
            leg_bait_point: None,
            rare_bait_point: None,

            hotkeys: Hotkeys::default(),
            rod_hotkey: "1".to_string(),
            anything_else_hotkey: "2".to_string(),
            devil_fruit_hotkey: "3".to_string(),

            kp: 0.0,
            kd: 0.0,
            pd_clamp: 0.0,
            pd_approaching_damping: 0.0,
            pd_chasing_damping: 0.0,
            gap_tolerance_multiplier: 0.0,
            cast_hold_duration: 0.0,
            recast_timeout: 0.0,
            max_recast_failures: 5,
            fish_end_delay: 1.0,
            catch_grace_period: 3.0,
            scan_loop_delay: 0.0,
            state_resend_interval: 0.0,
            black_screen_threshold: 0.0,
            rod_select_delay: 0.0,
            cursor_anti_detect_delay: 0.0,
            auto_select_bait_delay: 0.0,

            auto_buy_common_bait: false,
            auto_select_top_bait: false,
            auto_store_devil_fruit: false,
            auto_craft_bait: false,
            craft_leg_bait: false,
            craft_rare_bait: false,

            loops_per_purchase: 0,
            pre_cast_e_delay: 0.0,
            pre_cast_click_delay: 0.0,
            pre_cast_type_delay: 0.0,
            pre_cast_anti_detect_delay: 0.0,

            craft_nav_key_1: String::new(),
            craft_nav_duration_1: 0.0,
            craft_nav_key_2: String::new(),
            craft_nav_duration_2: 0.0,
            craft_nav_wait_delay: 0.0,
            craft_t_press_delay: 0.0,
            craft_click_delay: 0.0,
            craft_button_delay: 0.0,
            craft_craft_button_delay: 0.0,
            craft_sequence_delay: 0.0,
            craft_exit_delay: 0.0,

            store_fruit_hotkey_delay: 0.0,
            store_fruit_click_delay: 0.0,
            store_fruit_shift_delay: 0.0,
            store_fruit_backspace_delay: 0.0,

            webhook_enabled: false,
            webhook_url: String::new(),
            discord_user_id: String::new(),
            webhook_notify_devil_fruit: true,
            webhook_notify_purchase: true,
            webhook_notify_recovery: true,
        };
        settings.reset_advanced();
        settings
    }

    /// Reset timing, PD and delay tunables to their defaults.
    /// Toggles, points, hotkeys and webhook settings are kept.
    pub fn reset_advanced(&mut self) {
        self.kp = 0.9;
        self.kd = 0.3;
        self.pd_clamp = 1.0;
        self.pd_approaching_damping = 2.0;
        self.pd_chasing_damping = 0.5;

        self.cast_hold_duration = 1.0;
        self.recast_timeout = 30.0;
        self.fish_end_delay = 1.0;

        self.craft_nav_key_1 = "s".to_string();
        self.craft_nav_duration_1 = 0.3;
        self.craft_nav_key_2 = "d".to_string();
        self.craft_nav_duration_2 = 3.5;
        self.craft_nav_wait_delay = 1.0;
        self.craft_t_press_delay = 1.0;
        self.craft_click_delay = 1.0;
        self.craft_button_delay = 0.5;
        self.craft_craft_button_delay = 0.5;
        self.craft_sequence_delay = 0.3;
        self.craft_exit_delay = 0.5;

        self.loops_per_purchase = 100;

        self.store_fruit_hotkey_delay = 1.0;
        self.store_fruit_click_delay = 2.0;
        self.store_fruit_shift_delay = 0.5;
        self.store_fruit_backspace_delay = 1.5;

        self.pre_cast_e_delay = 1.5;
        self.pre_cast_click_delay = 1.0;
        self.pre_cast_type_delay = 1.0;
        self.pre_cast_anti_detect_delay = 0.05;
        self.auto_select_bait_delay = 0.5;
        self.rod_select_delay = 0.5;
        self.cursor_anti_detect_delay = 0.05;
        self.scan_loop_delay = 0.0;
        self.state_resend_interval = 0.1;
        self.black_screen_threshold = 0.5;

        self.gap_tolerance_multiplier = 2.0;
    }

    /// Parse a settings document, filling missing keys with defaults for `screen`
    pub fn from_json_str(content: &str, screen: (i32, i32)) -> Result<Self> {
        let user: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(content).context("Settings document is not a JSON object")?;

        let mut merged = match serde_json::to_value(Self::for_screen(screen))? {
            serde_json::Value::Object(map) => map,
            _ => anyhow::bail!("Default settings did not serialize to an object"),
        };
        for (key, value) in user {
            if !merged.contains_key(&key) {
                continue;
            }
            // Each key is checked on its own so one bad value keeps the rest
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value);
            match serde_json::from_value::<Self>(serde_json::Value::Object(candidate.clone())) {
                Ok(_) => merged = candidate,
                Err(e) => tracing::warn!("[SETTINGS] Ignoring '{}', using its default: {}", key, e),
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged))
            .context("Default settings did not deserialize")
    }

    /// Load settings from `path`. A missing or unreadable document yields defaults.
    pub fn load(path: &Path, screen: (i32, i32)) -> Self {
        if !path.exists() {
            tracing::info!("[SETTINGS] No settings at {:?}, using defaults", path);
            return Self::for_screen(screen);
        }

        let parsed = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))
            .and_then(|content| Self::from_json_str(&content, screen));

        match parsed {
            Ok(settings) => {
                tracing::info!("[SETTINGS] Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("[SETTINGS] {:#}, using defaults", e);
                Self::for_screen(screen)
            }
        }
    }

    /// Write the document as pretty JSON, creating parent folders
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::debug!("[SETTINGS] Saved settings to {:?}", path);
        Ok(())
    }

    /// Check the calibration a run needs before anything starts
    pub fn validate_for_start(&self) -> Result<(), MacroError> {
        if self.water_point.is_none() {
            return Err(MacroError::WaterPointUnset);
        }
        match self.area_box {
            None => Err(MacroError::AreaUnset),
            Some(area) if !area.is_valid() => Err(MacroError::EmptyArea(area)),
            Some(_) => Ok(()),
        }
    }

    pub fn pd_gains(&self) -> PdGains {
        PdGains {
            kp: self.kp,
            kd: self.kd,
            clamp: self.pd_clamp,
            approaching_damping: self.pd_approaching_damping,
            chasing_damping: self.pd_chasing_damping,
        }
    }

    /// Craft points 1-4 in order, if all of them are set
    pub fn craft_points(&self) -> Option<[Point; 4]> {
        Some([
            self.craft_point_1?,
            self.craft_point_2?,
            self.craft_point_3?,
            self.craft_point_4?,
        ])
    }
}

/// Longest delay any timing key can ask for
pub const MAX_SETTING_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Seconds from the settings document as a `Duration`.
/// Negative and non-finite values count as zero, huge ones are capped at a day.
pub fn secs(value: f64) -> Duration {
    if !(value.is_finite() && value > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value)
        .unwrap_or(MAX_SETTING_DELAY)
        .min(MAX_SETTING_DELAY)
}
