//! Render configuration consumed by the compositor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FpsError;

// ── Color ────────────────────────────────────────────────────────

/// RGBA color with every channel in `0.0..=1.0`.
///
/// Serialized as a `[r, g, b, a]` array; out-of-range channels are
/// clamped when read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn clamp_channel(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl Color {
    pub const WHITE: Color = Color::rgba_unchecked(1.0, 1.0, 1.0, 1.0);
    pub const GREEN: Color = Color::rgba_unchecked(0.0, 1.0, 0.0, 1.0);
    pub const TRANSLUCENT_BLACK: Color = Color::rgba_unchecked(0.0, 0.0, 0.0, 0.5);

    const fn rgba_unchecked(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build a color, clamping each channel.
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
            a: clamp_channel(a),
        }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Channel scaled to a byte.
    pub fn channel_u8(v: f32) -> u8 {
        (clamp_channel(v) * 255.0).round() as u8
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Color::rgba(r, g, b, a)
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

/// Parses `"r,g,b"` or `"r,g,b,a"`; alpha defaults to `1.0`.
impl FromStr for Color {
    type Err = FpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| FpsError::InvalidConfig(format!("color '{s}': {e}")))?;

        match parts.as_slice() {
            [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
            [r, g, b, a] => Ok(Color::rgba(*r, *g, *b, *a)),
            _ => Err(FpsError::InvalidConfig(format!(
                "color '{s}': expected 3 or 4 components, got {}",
                parts.len()
            ))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3},{:.3},{:.3}", self.r, self.g, self.b, self.a)
    }
}

// ── Corner ───────────────────────────────────────────────────────

/// Screen corner the overlay is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Corner {
    #[default]
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Corner::TopLeft => "Top Left",
            Corner::TopRight => "Top Right",
            Corner::BottomLeft => "Bottom Left",
            Corner::BottomRight => "Bottom Right",
        }
    }
}

impl TryFrom<u8> for Corner {
    type Error = FpsError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Corner::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| FpsError::InvalidConfig(format!("corner code {code} is not in 0..=3")))
    }
}

impl From<Corner> for u8 {
    fn from(c: Corner) -> Self {
        c as u8
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── RenderConfig ─────────────────────────────────────────────────

/// Snapshot of everything the compositor needs for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub enabled: bool,
    pub corner: Corner,
    pub font_name: String,
    /// Font height in pixels.
    pub font_size: u32,
    pub text_color: Color,
    pub background_color: Color,
    pub show_background: bool,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Advisory only; the scheduler's cadence is fixed.
    pub update_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            corner: Corner::TopLeft,
            font_name: "Consolas".to_string(),
            font_size: 16,
            text_color: Color::GREEN,
            background_color: Color::TRANSLUCENT_BLACK,
            show_background: true,
            offset_x: 10,
            offset_y: 10,
            update_interval_ms: 500,
        }
    }
}
