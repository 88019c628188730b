//! # fps-core
//!
//! Frame-rate overlay core: works out which graphics API the current
//! process renders with, estimates a smoothed frame rate and draws it in
//! a click-through, always-on-top layered window.
//!
//! This crate contains:
//! - **Detection**: `GraphicsSurfaceDetector` over a `ModuleInventory`
//! - **Frame signals**: `FrameSignalSource` (polling, or a pluggable `PresentInterceptor`)
//! - **Statistics**: `FrameTimeStatistics`, a 60-sample window with EMA smoothing
//! - **Overlay**: `RenderConfig`, placement and the `LayeredCompositor`
//! - **Scheduler**: `OverlayScheduler`, the worker that ties it all together
//! - **Error**: `FpsError`, the `thiserror`-based error type

pub mod backend;
pub mod detect;
pub mod error;
pub mod host;
pub mod overlay;
pub mod scheduler;
pub mod shared;
pub mod signal;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use backend::GraphicsBackend;
pub use detect::{BackendChange, GraphicsSurfaceDetector, ModuleInventory, available_backends};
pub use error::FpsError;
pub use host::{ForegroundWindow, Host, NativeHost, OsVersion, ProcessInfo, WindowRect};
pub use overlay::{
    Color, Corner, LayeredCompositor, OverlayCompositor, OverlayPlacement, OverlaySize,
    RenderConfig, ScreenSize, compute_placement, format_rate,
};
pub use scheduler::{OverlayScheduler, SchedulerConfig};
pub use shared::{ConfigHandle, OverlayState};
pub use signal::{
    DetourUnavailable, FrameSignalSource, PresentEntryPoint, PresentInterceptor, PresentQueue,
    SignalPolicy, present_entry_point, push_present,
};
pub use stats::{FrameTimeStatistics, TickOutcome};
