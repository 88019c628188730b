//! Error types for the overlay core.
//!
//! Only surface failures are meant to reach callers (from
//! [`OverlayCompositor::initialize`](crate::overlay::OverlayCompositor::initialize)
//! and [`OverlayScheduler::start`](crate::OverlayScheduler::start)).
//! Detection and interception failures are absorbed where they occur
//! and logged.

use thiserror::Error;

/// The canonical error type for the overlay core.
#[derive(Debug, Error)]
pub enum FpsError {
    // ── Surface Errors ───────────────────────────────────────────
    /// The overlay surface could not be created or updated.
    #[error("surface error: {0}")]
    Surface(String),

    /// The primary screen size could not be queried.
    #[error("screen size unavailable")]
    ScreenUnavailable,

    // ── Detection Errors ─────────────────────────────────────────
    /// Enumerating the modules of the current process failed.
    #[error("module enumeration failed: {0}")]
    Enumeration(String),

    // ── Frame Signal Errors ──────────────────────────────────────
    /// A present-call interceptor could not be installed.
    #[error("present interception unavailable: {0}")]
    InterceptUnavailable(String),

    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration value failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ── Platform Errors ──────────────────────────────────────────
    /// The operation is not available on this platform.
    #[error("{0} is only supported on Windows")]
    Unsupported(&'static str),

    /// The system does not meet the overlay's requirements.
    #[error("system not compatible: {0}")]
    Incompatible(String),

    /// The I/O layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The scheduler worker panicked or could not be spawned.
    #[error("worker error: {0}")]
    Worker(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FpsError {
    fn from(s: String) -> Self {
        FpsError::Other(s)
    }
}

impl From<&str> for FpsError {
    fn from(s: &str) -> Self {
        FpsError::Other(s.to_string())
    }
}
