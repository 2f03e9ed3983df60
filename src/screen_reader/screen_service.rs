//! Screen capture service

use anyhow::{Context, Result};
use image::RgbaImage;
use screenshots::Screen;

use crate::utils::settings::{ScreenRegion, DEFAULT_SCREEN};

/// Anything that can hand the fishing loop a frame of a screen region
pub trait FrameSource: Send {
    /// Capture `region` as an RGBA buffer, row-major with a top-left origin
    fn capture(&mut self, region: &ScreenRegion) -> Result<RgbaImage>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self, region: &ScreenRegion) -> Result<RgbaImage> {
        (**self).capture(region)
    }
}

/// Captures regions of the primary display
#[derive(Default)]
pub struct ScreenService;

impl ScreenService {
    pub fn new() -> Self {
        Self
    }

    fn grab(&self, region: &ScreenRegion) -> Result<RgbaImage> {
        if !region.is_valid() {
            anyhow::bail!("Capture region {} is empty", region);
        }

        let screens = Screen::all().context("Failed to get screens")?;
        let screen = screens.first().context("No screens found")?;

        let image = screen
            .capture_area(region.x1, region.y1, region.width(), region.height())
            .context("Failed to capture area")?;

        RgbaImage::from_raw(image.width(), image.height(), image.to_vec())
            .context("Failed to create image from raw data")
    }
}

impl FrameSource for ScreenService {
    fn capture(&mut self, region: &ScreenRegion) -> Result<RgbaImage> {
        self.grab(region)
    }
}

/// Size of the primary display, falling back to 1920x1080
pub fn screen_size() -> (i32, i32) {
    match Screen::all() {
        Ok(screens) => screens
            .first()
            .map(|s| (s.display_info.width as i32, s.display_info.height as i32))
            .unwrap_or(DEFAULT_SCREEN),
        Err(e) => {
            tracing::warn!("Failed to query screen size: {}", e);
            DEFAULT_SCREEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_region_is_rejected() {
        let mut service = ScreenService::new();
        let err = service
            .capture(&ScreenRegion::new(10, 10, 10, 50))
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
