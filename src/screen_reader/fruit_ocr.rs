//! Devil fruit drop detection from the catch notification text

use std::collections::HashMap;
use std::time::{Duration, Instant};

use image::{imageops, DynamicImage, GrayImage, RgbaImage};
use rusty_tesseract::{Args, Image as TessImage};

use super::screen_service::FrameSource;
use crate::utils::settings::Settings;

/// Minimum time between two scans
pub const OCR_COOLDOWN: Duration = Duration::from_millis(1500);

/// Substrings that survive typical OCR damage to the drop notification
const DROP_KEYWORDS: [&str; 8] = [
    "drop", "backpac", "ruit", "evil", "got", "fish", "legendar", "pity",
];

/// Keyword hits needed before the text counts as a fruit drop
const MIN_KEYWORD_HITS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropScan {
    pub has_fruit: bool,
    /// Pity counter read as reset, which only happens on a legendary+ drop
    pub is_legendary: bool,
}

/// Scans the notification area after a catch
pub trait DropScanner: Send {
    fn scan(&mut self, settings: &Settings) -> DropScan;
}

/// Token right after "pity" and a `:`/whitespace separator, made of digits and the
/// letters OCR confuses them with
fn pity_token(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(pos) = text[from..].find("pity") {
        let rest = &text[from + pos + 4..];
        let sep_len = rest
            .char_indices()
            .find(|(_, c)| !(*c == ':' || c.is_whitespace()))
            .map_or(rest.len(), |(i, _)| i);
        if sep_len > 0 {
            let after = &rest[sep_len..];
            let token_len = after
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_digit() || *c == 'o' || *c == 'l'))
                .map_or(after.len(), |(i, _)| i);
            if token_len > 0 {
                return Some(&after[..token_len]);
            }
        }
        from += pos + 4;
    }
    None
}

/// Classify recognized notification text
pub fn classify_drop_text(text: &str) -> DropScan {
    let text = text.to_lowercase();
    let hits = DROP_KEYWORDS.iter().filter(|k| text.contains(*k)).count();
    let has_fruit = hits >= MIN_KEYWORD_HITS;
    let is_legendary = has_fruit
        && pity_token(&text).is_some_and(|token| {
            token.len() <= 2 && token.starts_with(|c| c == '0' || c == 'o' || c == 'l')
        });
    DropScan {
        has_fruit,
        is_legendary,
    }
}

/// Shrink to at most 800x600, grayscale and lift contrast
fn preprocess(frame: &RgbaImage) -> GrayImage {
    let (w, h) = frame.dimensions();
    let scale = (800.0 / w as f64).min(600.0 / h as f64);
    let gray = DynamicImage::ImageRgba8(frame.clone()).to_luma8();
    let mut gray = if scale < 1.0 {
        imageops::resize(
            &gray,
            ((w as f64 * scale) as u32).max(1),
            ((h as f64 * scale) as u32).max(1),
            imageops::FilterType::Triangle,
        )
    } else {
        gray
    };
    for p in gray.pixels_mut() {
        p.0[0] = (p.0[0] as u32 * 12 / 10 + 10).min(255) as u8;
    }
    gray
}

/// OCR through the tesseract command line
pub struct TesseractScanner {
    source: Box<dyn FrameSource>,
    screen: (i32, i32),
    last_scan: Option<Instant>,
}

impl TesseractScanner {
    pub fn new(source: Box<dyn FrameSource>, screen: (i32, i32)) -> Self {
        Self {
            source,
            screen,
            last_scan: None,
        }
    }

    fn recognize(image: &DynamicImage) -> Option<String> {
        let tess_image = match TessImage::from_dynamic_image(image) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!("[OCR] Failed to create Tesseract image: {:?}", e);
                return None;
            }
        };
        let args = Args {
            lang: "eng".to_string(),
            config_variables: HashMap::new(),
            dpi: Some(150),
            psm: Some(6),
            oem: Some(3),
        };
        match rusty_tesseract::image_to_string(&tess_image, &args) {
            Ok(text) => {
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                tracing::warn!("[OCR] Tesseract failed: {:?}", e);
                None
            }
        }
    }
}

impl DropScanner for TesseractScanner {
    fn scan(&mut self, settings: &Settings) -> DropScan {
        let now = Instant::now();
        if self
            .last_scan
            .is_some_and(|last| now.duration_since(last) < OCR_COOLDOWN)
        {
            return DropScan::default();
        }
        self.last_scan = Some(now);

        let region = settings.ocr_area_box_percentages.to_region(self.screen);
        let frame = match self.source.capture(&region) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("[OCR] Capture of {} failed: {:#}", region, e);
                return DropScan::default();
            }
        };

        let text = Self::recognize(&DynamicImage::ImageRgba8(frame.clone())).or_else(|| {
            tracing::debug!("[OCR] No text on raw capture, retrying with preprocessing");
            Self::recognize(&DynamicImage::ImageLuma8(preprocess(&frame)))
        });
        let Some(text) = text else {
            tracing::info!("[OCR] No text in scan area");
            return DropScan::default();
        };

        let scan = classify_drop_text(&text);
        tracing::info!(
            "[OCR] '{}' -> fruit: {}, legendary: {}",
            text.chars().take(100).collect::<String>(),
            scan.has_fruit,
            scan.is_legendary
        );
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fruit_notification() {
        let scan = classify_drop_text("You got a Devil Fruit! Check your backpack");
        assert!(scan.has_fruit);
        assert!(!scan.is_legendary);
    }

    #[test]
    fn test_single_keyword_is_not_enough() {
        assert_eq!(classify_drop_text("fishing level up"), DropScan::default());
        assert_eq!(classify_drop_text(""), DropScan::default());
    }

    #[test]
    fn test_pity_reset_is_legendary() {
        for text in [
            "Devil Fruit dropped! Pity: 0/40",
            "eruit drop pity o/40",
            "ruit drop PITY:  l",
            "evil ruit pity 00",
        ] {
            assert!(classify_drop_text(text).is_legendary, "{}", text);
        }
    }

    #[test]
    fn test_pity_counter_not_reset() {
        for text in [
            "Devil Fruit dropped! Pity: 12/40",
            "devil fruit drop pity: 0001",
            "devil fruit drop pity0",
            "devil fruit drop pity:",
        ] {
            assert!(!classify_drop_text(text).is_legendary, "{}", text);
        }
    }

    #[test]
    fn test_pity_token_skips_unseparated_match() {
        assert_eq!(pity_token("pityx pity: 3"), Some("3"));
    }

    #[test]
    fn test_legendary_requires_fruit() {
        // "pity" alone is a single keyword hit
        assert!(!classify_drop_text("pity: 0").is_legendary);
    }

    #[test]
    fn test_preprocess_limits_size() {
        let frame = RgbaImage::from_pixel(1600, 300, image::Rgba([100, 100, 100, 255]));
        let gray = preprocess(&frame);
        assert_eq!(gray.dimensions(), (800, 150));

        let small = RgbaImage::from_pixel(10, 10, image::Rgba([100, 100, 100, 255]));
        assert_eq!(preprocess(&small).get_pixel(0, 0).0[0], 130);
    }
}
