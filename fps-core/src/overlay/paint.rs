//! Text formatting and pixel composition for the overlay layer.
//!
//! GDI cannot draw with per-pixel alpha, so text is rasterized white on
//! black and the resulting luminance is used as text coverage. The layer
//! is then rebuilt here as premultiplied BGRA for `UpdateLayeredWindow`.

use super::config::Color;

/// Rate label shown on the overlay, e.g. `"59.9 FPS"`.
pub fn format_rate(rate: f64) -> String {
    let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
    format!("{rate:.1} FPS")
}

/// Rewrite a white-on-black BGRA mask in place as premultiplied BGRA.
///
/// Text coverage is the brightest channel of each pixel. The background
/// color is blended under the text when `background` is set; otherwise
/// uncovered pixels become fully transparent.
pub fn compose_layer(pixels: &mut [u8], text: Color, background: Option<Color>) {
    let bg = background.unwrap_or(Color::rgba(0.0, 0.0, 0.0, 0.0));

    for px in pixels.chunks_exact_mut(4) {
        let coverage = f32::from(px[0].max(px[1]).max(px[2])) / 255.0;
        let ta = coverage * text.a;
        let ba = bg.a * (1.0 - ta);

        let r = text.r * ta + bg.r * ba;
        let g = text.g * ta + bg.g * ba;
        let b = text.b * ta + bg.b * ba;

        px[0] = Color::channel_u8(b);
        px[1] = Color::channel_u8(g);
        px[2] = Color::channel_u8(r);
        px[3] = Color::channel_u8(ta + ba);
    }
}
