//! Exact-match color classification of captured frames

use image::{Rgba, RgbaImage};

/// Target color, matched exactly on the RGB channels (alpha ignored)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Marker color of the minigame
pub const BITE_BLUE: Rgb = Rgb(85, 170, 255);
/// Target zone color
pub const BITE_WHITE: Rgb = Rgb(255, 255, 255);
/// Bar and tracker color
pub const BITE_DARK_GRAY: Rgb = Rgb(25, 25, 25);
/// Blank screen color
pub const PURE_BLACK: Rgb = Rgb(0, 0, 0);

/// The three colors that appear together when a fish bites
pub const BITE_COLORS: [Rgb; 3] = [BITE_BLUE, BITE_WHITE, BITE_DARK_GRAY];

impl Rgb {
    #[inline]
    pub fn matches(&self, pixel: &Rgba<u8>) -> bool {
        pixel[0] == self.0 && pixel[1] == self.1 && pixel[2] == self.2
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.0, self.1, self.2, 255])
    }
}

/// Boolean mask of a frame for one color
#[derive(Debug, Clone)]
pub struct ColorMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl ColorMask {
    pub fn of(frame: &RgbaImage, color: Rgb) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            bits: frame.pixels().map(|p| color.matches(p)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    pub fn any(&self) -> bool {
        self.bits.iter().any(|&b| b)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Matching `(x, y)` coordinates in row-major order
    pub fn coords(&self) -> Vec<(u32, u32)> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| (i as u32 % self.width, i as u32 / self.width))
            .collect()
    }

    /// Truncated mean x of the matching pixels
    pub fn mean_x(&self) -> Option<u32> {
        let mut sum = 0u64;
        let mut n = 0u64;
        for (i, &b) in self.bits.iter().enumerate() {
            if b {
                sum += i as u64 % self.width as u64;
                n += 1;
            }
        }
        (n > 0).then(|| (sum / n) as u32)
    }
}

/// True when every color in `colors` occurs somewhere in the frame
pub fn contains_all(frame: &RgbaImage, colors: &[Rgb]) -> bool {
    let mut seen = vec![false; colors.len()];
    let mut remaining = colors.len();
    if remaining == 0 {
        return true;
    }
    for pixel in frame.pixels() {
        for (i, color) in colors.iter().enumerate() {
            if !seen[i] && color.matches(pixel) {
                seen[i] = true;
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
            }
        }
    }
    false
}

/// Rows of column `x` whose pixel matches `color`, top to bottom
pub fn column_rows(frame: &RgbaImage, x: u32, color: Rgb) -> Vec<u32> {
    if x >= frame.width() {
        return Vec::new();
    }
    (0..frame.height())
        .filter(|&y| color.matches(frame.get_pixel(x, y)))
        .collect()
}

/// Fraction of the frame's pixels matching `color`
pub fn color_ratio(frame: &RgbaImage, color: Rgb) -> f64 {
    let total = frame.width() as u64 * frame.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let matching = frame.pixels().filter(|p| color.matches(p)).count() as u64;
    matching as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(pixels: &[(u32, u32, Rgb)]) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(8, 6, Rgba([90, 90, 90, 255]));
        for &(x, y, c) in pixels {
            frame.put_pixel(x, y, c.to_rgba());
        }
        frame
    }

    #[test]
    fn test_exact_match_only() {
        let near_blue = Rgba([85, 170, 254, 255]);
        assert!(!BITE_BLUE.matches(&near_blue));
        assert!(BITE_BLUE.matches(&Rgba([85, 170, 255, 0])));
    }

    #[test]
    fn test_mask_coords_and_mean() {
        let frame = frame_with(&[(2, 1, BITE_BLUE), (5, 1, BITE_BLUE), (6, 4, BITE_BLUE)]);
        let mask = ColorMask::of(&frame, BITE_BLUE);
        assert!(mask.any());
        assert_eq!(mask.count(), 3);
        assert_eq!(mask.coords(), vec![(2, 1), (5, 1), (6, 4)]);
        assert_eq!(mask.mean_x(), Some(4));
        assert!(mask.get(6, 4));
        assert!(!mask.get(100, 4));
    }

    #[test]
    fn test_contains_all_needs_every_color() {
        let partial = frame_with(&[(0, 0, BITE_BLUE), (1, 0, BITE_WHITE)]);
        assert!(!contains_all(&partial, &BITE_COLORS));

        let full = frame_with(&[(0, 0, BITE_BLUE), (1, 0, BITE_WHITE), (7, 5, BITE_DARK_GRAY)]);
        assert!(contains_all(&full, &BITE_COLORS));
    }

    #[test]
    fn test_column_rows() {
        let frame = frame_with(&[(3, 0, BITE_DARK_GRAY), (3, 4, BITE_DARK_GRAY), (2, 2, BITE_DARK_GRAY)]);
        assert_eq!(column_rows(&frame, 3, BITE_DARK_GRAY), vec![0, 4]);
        assert!(column_rows(&frame, 99, BITE_DARK_GRAY).is_empty());
    }

    #[test]
    fn test_color_ratio() {
        let mut frame = RgbaImage::from_pixel(4, 4, PURE_BLACK.to_rgba());
        frame.put_pixel(0, 0, BITE_WHITE.to_rgba());
        assert!((color_ratio(&frame, PURE_BLACK) - 15.0 / 16.0).abs() < 1e-9);
    }
}
