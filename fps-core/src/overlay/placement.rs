//! Overlay sizing and placement.

use super::config::Corner;

/// Horizontal padding added to the measured text width.
pub const PADDING_X: u32 = 20;
/// Vertical padding added to the measured text height.
pub const PADDING_Y: u32 = 10;

/// Primary screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Overlay surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySize {
    pub width: u32,
    pub height: u32,
}

impl OverlaySize {
    /// Used when the text extent cannot be measured.
    pub const FALLBACK: OverlaySize = OverlaySize {
        width: 100,
        height: 30,
    };

    /// Text extent plus padding.
    pub fn padded(text_width: u32, text_height: u32) -> Self {
        Self {
            width: text_width.saturating_add(PADDING_X),
            height: text_height.saturating_add(PADDING_Y),
        }
    }
}

/// Top-left corner and size of the overlay on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Position an overlay of `size` in `corner` of `screen`, inset by the
/// offsets, then clamp it on-screen. When the overlay is larger than the
/// screen the lower bound (0) wins.
pub fn compute_placement(
    screen: ScreenSize,
    size: OverlaySize,
    corner: Corner,
    offset_x: i32,
    offset_y: i32,
) -> OverlayPlacement {
    let sw = i64::from(screen.width);
    let sh = i64::from(screen.height);
    let w = i64::from(size.width);
    let h = i64::from(size.height);
    let (ox, oy) = (i64::from(offset_x), i64::from(offset_y));

    let (x, y) = match corner {
        Corner::TopLeft => (ox, oy),
        Corner::TopRight => (sw - w - ox, oy),
        Corner::BottomLeft => (ox, sh - h - oy),
        Corner::BottomRight => (sw - w - ox, sh - h - oy),
    };

    let x = x.min(sw - w).max(0);
    let y = y.min(sh - h).max(0);

    OverlayPlacement {
        // Bounded by [0, screen dimension], which fits in i32 for any real display.
        x: i32::try_from(x).unwrap_or(i32::MAX),
        y: i32::try_from(y).unwrap_or(i32::MAX),
        width: size.width,
        height: size.height,
    }
}
