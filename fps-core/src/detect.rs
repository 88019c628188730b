//! Graphics backend detection.
//!
//! Classifies the active graphics API by looking at the modules loaded
//! into the current process. When several backends are loaded at once
//! the precedence is D3D11 > D3D9 > OpenGL, because modern engines
//! often keep legacy runtimes mapped next to the one they render with.
//!
//! If enumeration fails, or nothing matches, detection falls back to the
//! first library that a capability probe can load.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::GraphicsBackend;
use crate::error::FpsError;

/// Module-name fragments (lowercase) and the backend they indicate, in
/// precedence order.
const MODULE_SIGNATURES: &[(&[&str], GraphicsBackend)] = &[
    (&["d3d11", "dxgi"], GraphicsBackend::D3D11),
    (&["d3d9"], GraphicsBackend::D3D9),
    (&["opengl32"], GraphicsBackend::OpenGL),
];

/// Libraries tried by the capability probe, in probe order.
pub const PROBE_LIBRARIES: &[(&str, GraphicsBackend)] = &[
    ("d3d9.dll", GraphicsBackend::D3D9),
    ("d3d11.dll", GraphicsBackend::D3D11),
    ("opengl32.dll", GraphicsBackend::OpenGL),
];

// ── ModuleInventory ──────────────────────────────────────────────

/// Source of loaded-module information for the current process.
pub trait ModuleInventory: Send + Sync {
    /// Base names of every module mapped into the current process.
    fn loaded_modules(&self) -> Result<Vec<String>, FpsError>;

    /// Whether `library` can be loaded. Implementations must release
    /// anything they load while probing.
    fn probe_library(&self, library: &str) -> bool;
}

/// Classify a set of module names. Returns `Unknown` if none match.
pub fn classify_modules<S: AsRef<str>>(modules: &[S]) -> GraphicsBackend {
    let lowered: Vec<String> = modules
        .iter()
        .map(|m| m.as_ref().to_ascii_lowercase())
        .collect();

    MODULE_SIGNATURES
        .iter()
        .find(|(fragments, _)| {
            lowered
                .iter()
                .any(|name| fragments.iter().any(|f| name.contains(f)))
        })
        .map(|(_, backend)| *backend)
        .unwrap_or(GraphicsBackend::Unknown)
}

/// Every backend whose library the inventory can load, in probe order.
pub fn available_backends<I: ModuleInventory + ?Sized>(inventory: &I) -> Vec<GraphicsBackend> {
    PROBE_LIBRARIES
        .iter()
        .filter(|(library, _)| inventory.probe_library(library))
        .map(|(_, backend)| *backend)
        .collect()
}

// ── Detector ─────────────────────────────────────────────────────

/// Result of [`GraphicsSurfaceDetector::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChange {
    Unchanged(GraphicsBackend),
    Changed {
        from: GraphicsBackend,
        to: GraphicsBackend,
    },
}

impl BackendChange {
    pub fn current(&self) -> GraphicsBackend {
        match *self {
            BackendChange::Unchanged(b) => b,
            BackendChange::Changed { to, .. } => to,
        }
    }
}

/// Detects the active graphics backend and caches the last result.
pub struct GraphicsSurfaceDetector {
    inventory: Arc<dyn ModuleInventory>,
    current: GraphicsBackend,
}

impl GraphicsSurfaceDetector {
    /// Create a detector with nothing detected yet.
    pub fn new(inventory: Arc<dyn ModuleInventory>) -> Self {
        Self {
            inventory,
            current: GraphicsBackend::Unknown,
        }
    }

    /// Run detection without touching the cached value.
    pub fn detect(&self) -> GraphicsBackend {
        match self.inventory.loaded_modules() {
            Ok(modules) => {
                let backend = classify_modules(&modules);
                if backend.is_known() {
                    debug!("classified {} modules as {backend}", modules.len());
                    return backend;
                }
            }
            Err(e) => debug!("module enumeration failed: {e}; probing libraries"),
        }

        let fallback = PROBE_LIBRARIES
            .iter()
            .find(|(library, _)| self.inventory.probe_library(library))
            .map(|(_, backend)| *backend)
            .unwrap_or(GraphicsBackend::Unknown);

        if !fallback.is_known() {
            warn!("no compatible graphics API detected");
        }
        fallback
    }

    /// Detect and cache the result (initial detection).
    pub fn initialize(&mut self) -> GraphicsBackend {
        self.current = self.detect();
        info!("detected graphics API: {}", self.current);
        self.current
    }

    /// Re-run detection and report whether the backend changed.
    pub fn refresh(&mut self) -> BackendChange {
        let detected = self.detect();
        if detected == self.current {
            return BackendChange::Unchanged(detected);
        }
        let from = std::mem::replace(&mut self.current, detected);
        info!("graphics API changed: {from} -> {detected}");
        BackendChange::Changed { from, to: detected }
    }

    /// The cached backend.
    pub fn current(&self) -> GraphicsBackend {
        self.current
    }
}

// ── Tests ────────────────────────────────────────────────────────
