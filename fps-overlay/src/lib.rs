//! # fps-overlay
//!
//! Application shell around `fps-core`: TOML settings, the interactive
//! console menu, system reports, logging setup and single-instance
//! enforcement. The binary wires these to an
//! [`OverlayScheduler`](fps_core::OverlayScheduler).

pub mod config;
pub mod instance;
pub mod logging;
pub mod menu;
pub mod system;
