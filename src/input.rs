//! Input simulation for mouse and keyboard control
//!
//! `InputActuator` is the seam to the platform injector. `Controls` sits on top of it
//! and keeps the shared "button held" flag in step with the events it emits.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(windows)]
use enigo::{Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
#[cfg(windows)]
use parking_lot::Mutex;

use crate::utils::bot_state::SharedSignals;
use crate::utils::settings::Point;

/// Errors raised while injecting input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("input injection is not supported on this platform")]
    Unsupported,
    #[error("failed to initialize input backend: {0}")]
    Init(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("input injection failed: {0}")]
    Injection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
    Click,
}

/// Platform input injection
pub trait InputActuator: Send + Sync {
    /// Move the pointer to absolute screen coordinates
    fn move_to(&self, x: i32, y: i32) -> Result<(), InputError>;
    /// Move the pointer relative to its current position
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError>;
    fn button(&self, button: MouseButton, action: Action) -> Result<(), InputError>;
    fn key(&self, key: &str, action: Action) -> Result<(), InputError>;
    fn type_text(&self, text: &str) -> Result<(), InputError>;
}

/// Input helper shared by the fishing loop and the watchdog
#[derive(Clone)]
pub struct Controls {
    actuator: Arc<dyn InputActuator>,
    signals: Arc<SharedSignals>,
}

impl Controls {
    pub fn new(actuator: Arc<dyn InputActuator>, signals: Arc<SharedSignals>) -> Self {
        Self { actuator, signals }
    }

    pub fn is_holding(&self) -> bool {
        self.signals.is_holding()
    }

    /// Put the left button down and mark it held
    pub fn press_button(&self) -> Result<(), InputError> {
        self.actuator.button(MouseButton::Left, Action::Press)?;
        self.signals.set_holding(true);
        Ok(())
    }

    /// Let the left button up and mark it released
    pub fn release_button(&self) -> Result<(), InputError> {
        self.actuator.button(MouseButton::Left, Action::Release)?;
        self.signals.set_holding(false);
        Ok(())
    }

    /// Re-emit the current button state without changing it
    pub fn reassert_button(&self) -> Result<(), InputError> {
        let action = if self.is_holding() {
            Action::Press
        } else {
            Action::Release
        };
        self.actuator.button(MouseButton::Left, action)
    }

    /// Release the left button if it is held. Failures are logged, never returned.
    pub fn release_if_held(&self) {
        if !self.is_holding() {
            return;
        }
        match self.release_button() {
            Ok(()) => tracing::debug!("[INPUT] Released held mouse button"),
            Err(e) => tracing::warn!("[INPUT] Failed to release held mouse button: {}", e),
        }
    }

    pub fn move_to(&self, point: Point) -> Result<(), InputError> {
        self.actuator.move_to(point.x, point.y)
    }

    /// One pixel relative move so the game registers the new cursor position
    pub fn nudge(&self) -> Result<(), InputError> {
        self.actuator.move_by(0, 1)
    }

    pub fn click(&self) -> Result<(), InputError> {
        self.actuator.button(MouseButton::Left, Action::Click)
    }

    pub fn right_click(&self) -> Result<(), InputError> {
        self.actuator.button(MouseButton::Right, Action::Click)
    }

    /// Move, settle, nudge, settle, click
    pub fn reliable_click(&self, point: Point, settle: Duration) -> Result<(), InputError> {
        self.move_to(point)?;
        thread::sleep(settle);
        self.nudge()?;
        thread::sleep(settle);
        self.click()
    }

    pub fn tap_key(&self, key: &str) -> Result<(), InputError> {
        self.actuator.key(key, Action::Click)
    }

    /// Hold `key` down for `duration`
    pub fn hold_key(&self, key: &str, duration: Duration) -> Result<(), InputError> {
        self.actuator.key(key, Action::Press)?;
        thread::sleep(duration);
        self.actuator.key(key, Action::Release)
    }

    pub fn type_text(&self, text: &str) -> Result<(), InputError> {
        self.actuator.type_text(text)
    }
}

/// Input injection through enigo
#[cfg(windows)]
pub struct PlatformActuator {
    enigo: Mutex<Enigo>,
}

#[cfg(windows)]
impl PlatformActuator {
    pub fn new() -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::Init(format!("{:?}", e)))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }
}

#[cfg(windows)]
fn to_direction(action: Action) -> Direction {
    match action {
        Action::Press => Direction::Press,
        Action::Release => Direction::Release,
        Action::Click => Direction::Click,
    }
}

#[cfg(windows)]
impl InputActuator for PlatformActuator {
    fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.enigo
            .lock()
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InputError::Injection(format!("move to ({}, {}): {:?}", x, y, e)))
    }

    fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        self.enigo
            .lock()
            .move_mouse(dx, dy, Coordinate::Rel)
            .map_err(|e| InputError::Injection(format!("move by ({}, {}): {:?}", dx, dy, e)))
    }

    fn button(&self, button: MouseButton, action: Action) -> Result<(), InputError> {
        let button = match button {
            MouseButton::Left => enigo::Button::Left,
            MouseButton::Right => enigo::Button::Right,
        };
        self.enigo
            .lock()
            .button(button, to_direction(action))
            .map_err(|e| InputError::Injection(format!("{:?} {:?}: {:?}", button, action, e)))
    }

    fn key(&self, key: &str, action: Action) -> Result<(), InputError> {
        let enigo_key =
            string_to_enigo_key(key).ok_or_else(|| InputError::UnknownKey(key.to_string()))?;
        self.enigo
            .lock()
            .key(enigo_key, to_direction(action))
            .map_err(|e| InputError::Injection(format!("key '{}' {:?}: {:?}", key, action, e)))
    }

    fn type_text(&self, text: &str) -> Result<(), InputError> {
        self.enigo
            .lock()
            .text(text)
            .map_err(|e| InputError::Injection(format!("text '{}': {:?}", text, e)))
    }
}

/// Stand-in used where no injector exists; every call fails with `Unsupported`
#[cfg(not(windows))]
pub struct PlatformActuator;

#[cfg(not(windows))]
impl PlatformActuator {
    pub fn new() -> Result<Self, InputError> {
        tracing::warn!("[INPUT] Input injection not implemented on this platform");
        Ok(Self)
    }
}

#[cfg(not(windows))]
impl InputActuator for PlatformActuator {
    fn move_to(&self, _x: i32, _y: i32) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn move_by(&self, _dx: i32, _dy: i32) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn button(&self, _button: MouseButton, _action: Action) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn key(&self, _key: &str, _action: Action) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn type_text(&self, _text: &str) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }
}

/// Convert a key name from the settings document to an enigo key
#[cfg(windows)]
fn string_to_enigo_key(key: &str) -> Option<Key> {
    // Lowercase single characters avoid keyboard layout mapping issues
    if key.chars().count() == 1 {
        let c = key.chars().next()?.to_ascii_lowercase();
        return Some(Key::Unicode(c));
    }

    match key.to_uppercase().as_str() {
        "F1" => Some(Key::F1),
        "F2" => Some(Key::F2),
        "F3" => Some(Key::F3),
        "F4" => Some(Key::F4),
        "F5" => Some(Key::F5),
        "F6" => Some(Key::F6),
        "F7" => Some(Key::F7),
        "F8" => Some(Key::F8),
        "F9" => Some(Key::F9),
        "F10" => Some(Key::F10),
        "F11" => Some(Key::F11),
        "F12" => Some(Key::F12),
        "ESC" | "ESCAPE" => Some(Key::Escape),
        "ENTER" | "RETURN" => Some(Key::Return),
        "SPACE" => Some(Key::Space),
        "TAB" => Some(Key::Tab),
        "BACKSPACE" => Some(Key::Backspace),
        "UP" => Some(Key::UpArrow),
        "DOWN" => Some(Key::DownArrow),
        "LEFT" => Some(Key::LeftArrow),
        "RIGHT" => Some(Key::RightArrow),
        "SHIFT" => Some(Key::Shift),
        "CTRL" | "CONTROL" => Some(Key::Control),
        "ALT" => Some(Key::Alt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct Recorder {
        events: PlMutex<Vec<String>>,
        fail_buttons: bool,
    }

    impl InputActuator for Recorder {
        fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
            self.events.lock().push(format!("move {} {}", x, y));
            Ok(())
        }
        fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
            self.events.lock().push(format!("nudge {} {}", dx, dy));
            Ok(())
        }
        fn button(&self, button: MouseButton, action: Action) -> Result<(), InputError> {
            if self.fail_buttons {
                return Err(InputError::Injection("dropped".into()));
            }
            self.events.lock().push(format!("{:?} {:?}", button, action));
            Ok(())
        }
        fn key(&self, key: &str, action: Action) -> Result<(), InputError> {
            self.events.lock().push(format!("key {} {:?}", key, action));
            Ok(())
        }
        fn type_text(&self, text: &str) -> Result<(), InputError> {
            self.events.lock().push(format!("text {}", text));
            Ok(())
        }
    }

    #[test]
    fn test_press_and_release_track_holding() {
        let recorder = Arc::new(Recorder::default());
        let signals = Arc::new(SharedSignals::new());
        let controls = Controls::new(recorder.clone(), signals.clone());

        controls.press_button().unwrap();
        assert!(signals.is_holding());
        controls.release_if_held();
        assert!(!signals.is_holding());
        controls.release_if_held();

        assert_eq!(*recorder.events.lock(), vec!["Left Press", "Left Release"]);
    }

    #[test]
    fn test_failed_release_keeps_flag() {
        let recorder = Arc::new(Recorder {
            fail_buttons: true,
            ..Default::default()
        });
        let signals = Arc::new(SharedSignals::new());
        signals.set_holding(true);
        let controls = Controls::new(recorder, signals.clone());

        controls.release_if_held();
        assert!(signals.is_holding());
    }

    #[test]
    fn test_reliable_click_sequence() {
        let recorder = Arc::new(Recorder::default());
        let controls = Controls::new(recorder.clone(), Arc::new(SharedSignals::new()));

        controls
            .reliable_click(Point::new(10, 20), Duration::ZERO)
            .unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec!["move 10 20", "nudge 0 1", "Left Click"]
        );
    }

    #[test]
    #[cfg(windows)]
    fn test_string_to_enigo_key() {
        assert!(string_to_enigo_key("e").is_some());
        assert!(string_to_enigo_key("F9").is_some());
        assert!(string_to_enigo_key("space").is_some());
        assert!(string_to_enigo_key("INVALID_KEY_NAME_THAT_DOES_NOT_EXIST").is_none());
    }
}
