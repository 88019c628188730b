//! The on-screen overlay: configuration snapshot, placement, painting
//! and the layered-window compositor.

pub mod compositor;
pub mod config;
pub mod paint;
pub mod placement;

pub use compositor::{LayeredCompositor, OverlayCompositor};
pub use config::{Color, Corner, RenderConfig};
pub use paint::format_rate;
pub use placement::{OverlayPlacement, OverlaySize, ScreenSize, compute_placement};
