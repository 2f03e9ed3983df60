//! Error types surfaced by the macro controller

use crate::utils::settings::ScreenRegion;

/// Errors that reject a start request or a settings change.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("water point is not set, set it before starting")]
    WaterPointUnset,
    #[error("fishing area is not set, set it before starting")]
    AreaUnset,
    #[error("fishing area {0} is empty")]
    EmptyArea(ScreenRegion),
    #[error("invalid webhook url: {0}")]
    InvalidWebhookUrl(String),
    #[error("failed to spawn the fishing loop: {0}")]
    LoopSpawn(#[source] std::io::Error),
    #[error("failed to save settings: {0}")]
    SettingsSave(#[source] anyhow::Error),
}
