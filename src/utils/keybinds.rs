//! Hotkey names from the settings document

use std::str::FromStr;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};

use crate::input::InputError;

/// Normalize a single key name, `None` if the macro cannot bind or press it
pub fn resolve_key(key_name: &str) -> Option<String> {
    let key = key_name.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if key.chars().count() == 1 && key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(key);
    }
    string_to_code(&key).map(|_| key)
}

/// Convert a key name to a `global_hotkey` code
pub fn string_to_code(key: &str) -> Option<Code> {
    let key = key.trim().to_uppercase();
    let w3c = match key.as_str() {
        "ESC" | "ESCAPE" => "Escape".to_string(),
        "ENTER" | "RETURN" => "Enter".to_string(),
        "SPACE" => "Space".to_string(),
        "TAB" => "Tab".to_string(),
        "BACKSPACE" => "Backspace".to_string(),
        "DELETE" => "Delete".to_string(),
        "INSERT" => "Insert".to_string(),
        "HOME" => "Home".to_string(),
        "END" => "End".to_string(),
        "PAGEUP" => "PageUp".to_string(),
        "PAGEDOWN" => "PageDown".to_string(),
        "UP" => "ArrowUp".to_string(),
        "DOWN" => "ArrowDown".to_string(),
        "LEFT" => "ArrowLeft".to_string(),
        "RIGHT" => "ArrowRight".to_string(),
        k if k.len() == 1 && k.chars().all(|c| c.is_ascii_uppercase()) => format!("Key{}", k),
        k if k.len() == 1 && k.chars().all(|c| c.is_ascii_digit()) => format!("Digit{}", k),
        k if k.starts_with('F') && k[1..].parse::<u8>().is_ok_and(|n| (1..=24).contains(&n)) => {
            k.to_string()
        }
        _ => return None,
    };
    Code::from_str(&w3c).ok()
}

/// Parse a binding such as `f1` or `ctrl+shift+s`
pub fn parse_hotkey(binding: &str) -> Result<HotKey, InputError> {
    let mut modifiers = Modifiers::empty();
    let mut code = None;

    for part in binding.split('+').map(str::trim) {
        match part.to_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "shift" => modifiers |= Modifiers::SHIFT,
            "alt" => modifiers |= Modifiers::ALT,
            "win" | "super" | "meta" => modifiers |= Modifiers::SUPER,
            name => {
                if code.is_some() {
                    return Err(InputError::UnknownKey(binding.to_string()));
                }
                code = Some(
                    string_to_code(name).ok_or_else(|| InputError::UnknownKey(binding.to_string()))?,
                );
            }
        }
    }

    let code = code.ok_or_else(|| InputError::UnknownKey(binding.to_string()))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, code))
}
