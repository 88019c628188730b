//! State shared between the scheduler worker and its observers.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::backend::GraphicsBackend;
use crate::overlay::RenderConfig;

/// Values the worker publishes for other threads.
///
/// The rate is stored as `f64` bits in an `AtomicU64`.
#[derive(Debug, Default)]
pub struct OverlayState {
    rate_bits: AtomicU64,
    active: AtomicBool,
    backend: AtomicU8,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest smoothed frames per second.
    pub fn current_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Whether a worker is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::from_u8(self.backend.load(Ordering::Relaxed))
    }

    pub(crate) fn publish_rate(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub(crate) fn set_backend(&self, backend: GraphicsBackend) {
        self.backend.store(backend as u8, Ordering::Relaxed);
    }
}

/// Shared, replaceable render configuration.
///
/// Writers swap in a whole new value; the worker clones a snapshot each
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<RenderConfig>>,
}

impl ConfigHandle {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> RenderConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the configuration.
    pub fn replace(&self, config: RenderConfig) {
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    /// Edit the configuration in place.
    pub fn update<F: FnOnce(&mut RenderConfig)>(&self, f: F) {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
