//! Reads the minigame bar out of a captured frame

use image::RgbaImage;

use crate::screen_reader::color::{column_rows, ColorMask, BITE_BLUE, BITE_DARK_GRAY, BITE_WHITE};

/// Positions measured from one frame, in absolute screen rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarMeasurement {
    /// Column the bar was sampled in, relative to the frame
    pub column_x: u32,
    pub bar_top: i32,
    pub bar_bottom: i32,
    /// Middle of the white target zone
    pub setpoint_y: i32,
    /// Middle of the largest dark-gray cluster
    pub tracker_y: i32,
    /// Height of the target zone, or of the fallback window when no white was seen
    pub target_height: u32,
}

impl BarMeasurement {
    pub fn error(&self) -> i32 {
        self.setpoint_y - self.tracker_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarReading {
    /// No blue marker pixel in the frame
    NoMarker,
    /// Marker found but no dark-gray bar in its column
    NoBar,
    Reading(BarMeasurement),
}

/// Split ascending rows into clusters, breaking where consecutive rows are more than
/// `gap_tolerance` apart
pub fn group_rows(rows: &[u32], gap_tolerance: f64) -> Vec<Vec<u32>> {
    let mut groups: Vec<Vec<u32>> = Vec::new();
    let mut current: Vec<u32> = Vec::new();
    for &row in rows {
        if let Some(&prev) = current.last() {
            if (row as f64 - prev as f64) > gap_tolerance {
                groups.push(std::mem::take(&mut current));
            }
        }
        current.push(row);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Largest cluster, the earliest one when several share the largest size
pub fn largest_group(groups: &[Vec<u32>]) -> Option<&[u32]> {
    let mut best: Option<&Vec<u32>> = None;
    for group in groups {
        if best.map_or(true, |b| group.len() > b.len()) {
            best = Some(group);
        }
    }
    best.map(|g| g.as_slice())
}

fn midpoint(first: u32, last: u32) -> u32 {
    (first + last) / 2
}

/// Measure setpoint and tracker in `frame`, which was captured with its top edge at
/// screen row `region_top`
pub fn read_bar(frame: &RgbaImage, region_top: i32, gap_multiplier: f64) -> BarReading {
    let blue = ColorMask::of(frame, BITE_BLUE);
    let column_x = match blue.mean_x() {
        Some(x) => x,
        None => return BarReading::NoMarker,
    };

    let gray_rows = column_rows(frame, column_x, BITE_DARK_GRAY);
    let (bar_top, bar_bottom) = match (gray_rows.first(), gray_rows.last()) {
        (Some(&top), Some(&bottom)) => (top, bottom),
        _ => return BarReading::NoBar,
    };
    let bar_len = bar_bottom - bar_top + 1;

    let white_rel: Vec<u32> = column_rows(frame, column_x, BITE_WHITE)
        .into_iter()
        .filter(|&y| y >= bar_top && y <= bar_bottom)
        .map(|y| y - bar_top)
        .collect();
    let (white_top, white_bottom) = match (white_rel.first(), white_rel.last()) {
        (Some(&top), Some(&bottom)) => (top, bottom),
        // No target zone visible, aim at the top of the bar
        _ => (0, (bar_len / 10).max(5)),
    };
    let target_height = white_bottom - white_top + 1;

    let gray_rel: Vec<u32> = gray_rows.iter().map(|&y| y - bar_top).collect();
    let groups = group_rows(&gray_rel, target_height as f64 * gap_multiplier);
    let tracker = match largest_group(&groups) {
        Some(group) => midpoint(group[0], group[group.len() - 1]),
        None => return BarReading::NoBar,
    };

    let origin = region_top + bar_top as i32;
    BarReading::Reading(BarMeasurement {
        column_x,
        bar_top: origin,
        bar_bottom: region_top + bar_bottom as i32,
        setpoint_y: origin + midpoint(white_top, white_bottom) as i32,
        tracker_y: origin + tracker as i32,
        target_height,
    })
}
