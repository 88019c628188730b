//! Frame signal acquisition.
//!
//! A [`FrameSignalSource`] answers "when did a frame happen". The shipped
//! strategy is [`Polling`](SignalPolicy::Polling): one signal per
//! scheduler tick. It measures scheduler cadence rather than the target's
//! present timing, which is a known limitation.
//!
//! [`Intercepted`](SignalPolicy::Intercepted) is the extension point for
//! real present-call interception. A [`PresentInterceptor`] is handed the
//! backend's present entry point and pushes timestamps into a shared
//! queue. No memory-patching interceptor is built in; install failures
//! drop back to polling.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::GraphicsBackend;
use crate::error::FpsError;

/// Queue of present timestamps filled by an interceptor.
pub type PresentQueue = Arc<Mutex<VecDeque<Instant>>>;

/// Upper bound on queued timestamps; older entries are dropped first.
const QUEUE_LIMIT: usize = 1024;

// ── Policy ───────────────────────────────────────────────────────

/// How frame signals are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalPolicy {
    #[default]
    Polling,
    Intercepted,
}

impl fmt::Display for SignalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalPolicy::Polling => f.write_str("polling"),
            SignalPolicy::Intercepted => f.write_str("intercepted"),
        }
    }
}

impl FromStr for SignalPolicy {
    type Err = FpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(SignalPolicy::Polling),
            "intercepted" | "intercept" => Ok(SignalPolicy::Intercepted),
            other => Err(FpsError::InvalidConfig(format!(
                "unknown signal policy '{other}'"
            ))),
        }
    }
}

// ── Present entry points ─────────────────────────────────────────

/// The exported symbol an interceptor would attach to for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentEntryPoint {
    pub module: &'static str,
    pub symbol: &'static str,
}

/// Present entry point for `backend`, if one is known.
pub fn present_entry_point(backend: GraphicsBackend) -> Option<PresentEntryPoint> {
    let (module, symbol) = match backend {
        GraphicsBackend::D3D9 => ("d3d9.dll", "Direct3DCreate9"),
        GraphicsBackend::D3D11 => ("d3d11.dll", "D3D11CreateDevice"),
        GraphicsBackend::OpenGL => ("gdi32.dll", "SwapBuffers"),
        GraphicsBackend::Unknown | GraphicsBackend::D3D12 | GraphicsBackend::Vulkan => {
            return None;
        }
    };
    Some(PresentEntryPoint { module, symbol })
}

/// Pluggable present-call interception.
///
/// `install` must be all-or-nothing: on `Err` nothing stays attached.
pub trait PresentInterceptor: Send {
    fn name(&self) -> &str;

    fn install(&mut self, entry: PresentEntryPoint, queue: PresentQueue) -> Result<(), FpsError>;

    /// Detach. Called at most once per successful `install`.
    fn remove(&mut self);
}

/// Interceptor that always refuses to install.
#[derive(Debug, Default)]
pub struct DetourUnavailable;

impl PresentInterceptor for DetourUnavailable {
    fn name(&self) -> &str {
        "detour-unavailable"
    }

    fn install(&mut self, entry: PresentEntryPoint, _queue: PresentQueue) -> Result<(), FpsError> {
        Err(FpsError::InterceptUnavailable(format!(
            "no detour support for {}!{}",
            entry.module, entry.symbol
        )))
    }

    fn remove(&mut self) {}
}

/// Push a timestamp onto a present queue, dropping the oldest entry when
/// the queue is full. Intended for interceptor implementations.
pub fn push_present(queue: &PresentQueue, at: Instant) {
    let Ok(mut q) = queue.lock() else {
        return;
    };
    if q.len() >= QUEUE_LIMIT {
        q.pop_front();
    }
    q.push_back(at);
}

// ── FrameSignalSource ────────────────────────────────────────────

/// Source of frame timestamps, selected per backend.
pub enum FrameSignalSource {
    /// One signal per scheduler tick.
    Polling {
        /// Interceptor held for a later reprovision, never installed here.
        spare: Option<Box<dyn PresentInterceptor>>,
    },
    /// Timestamps pushed by an installed interceptor.
    Intercepted {
        interceptor: Box<dyn PresentInterceptor>,
        queue: PresentQueue,
        backend: GraphicsBackend,
    },
}

impl FrameSignalSource {
    /// A polling source with no interceptor.
    pub fn polling() -> Self {
        FrameSignalSource::Polling { spare: None }
    }

    /// Build a source for `backend` under `policy`.
    ///
    /// Interception that cannot be set up (no interceptor, no known entry
    /// point, install error) falls back to polling. The interceptor is
    /// kept either way so a later reprovision can try again.
    pub fn provision(
        policy: SignalPolicy,
        backend: GraphicsBackend,
        interceptor: Option<Box<dyn PresentInterceptor>>,
    ) -> Self {
        if policy == SignalPolicy::Polling {
            debug!("frame signals: polling");
            return FrameSignalSource::Polling { spare: interceptor };
        }

        let Some(mut interceptor) = interceptor else {
            warn!("no present interceptor available, falling back to polling");
            return FrameSignalSource::polling();
        };

        let Some(entry) = present_entry_point(backend) else {
            warn!("no present entry point for {backend}, falling back to polling");
            return FrameSignalSource::Polling {
                spare: Some(interceptor),
            };
        };

        let queue: PresentQueue = Arc::new(Mutex::new(VecDeque::new()));
        match interceptor.install(entry, queue.clone()) {
            Ok(()) => {
                info!(
                    "{} attached to {}!{}",
                    interceptor.name(),
                    entry.module,
                    entry.symbol
                );
                FrameSignalSource::Intercepted {
                    interceptor,
                    queue,
                    backend,
                }
            }
            Err(e) => {
                warn!("{}: {e}; falling back to polling", interceptor.name());
                FrameSignalSource::Polling {
                    spare: Some(interceptor),
                }
            }
        }
    }

    pub fn policy(&self) -> SignalPolicy {
        match self {
            FrameSignalSource::Polling { .. } => SignalPolicy::Polling,
            FrameSignalSource::Intercepted { .. } => SignalPolicy::Intercepted,
        }
    }

    /// Append the timestamps observed since the last call to `out`.
    pub fn collect(&mut self, now: Instant, out: &mut Vec<Instant>) {
        match self {
            FrameSignalSource::Polling { .. } => out.push(now),
            FrameSignalSource::Intercepted { queue, .. } => {
                if let Ok(mut q) = queue.lock() {
                    out.extend(q.drain(..));
                }
            }
        }
    }

    /// Detach any installed interceptor. Returns it for reuse.
    pub fn teardown(self) -> Option<Box<dyn PresentInterceptor>> {
        match self {
            FrameSignalSource::Polling { spare } => spare,
            FrameSignalSource::Intercepted {
                mut interceptor,
                backend,
                ..
            } => {
                interceptor.remove();
                debug!("{} detached from {backend}", interceptor.name());
                Some(interceptor)
            }
        }
    }
}

impl fmt::Debug for FrameSignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSignalSource::Polling { .. } => f.write_str("FrameSignalSource::Polling"),
            FrameSignalSource::Intercepted { backend, .. } => {
                write!(f, "FrameSignalSource::Intercepted({backend})")
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        installs: AtomicUsize,
        removes: AtomicUsize,
    }

    struct FakeInterceptor {
        counters: Arc<Counters>,
        queue: Option<PresentQueue>,
    }

    impl PresentInterceptor for FakeInterceptor {
        fn name(&self) -> &str {
            "fake"
        }

        fn install(&mut self, _entry: PresentEntryPoint, queue: PresentQueue) -> Result<(), FpsError> {
            self.counters.installs.fetch_add(1, Ordering::SeqCst);
            self.queue = Some(queue);
            Ok(())
        }

        fn remove(&mut self) {
            self.counters.removes.fetch_add(1, Ordering::SeqCst);
            self.queue = None;
        }
    }

    #[test]
    fn polling_emits_one_signal_per_collect() {
        let mut source = FrameSignalSource::polling();
        let now = Instant::now();
        let mut out = Vec::new();
        source.collect(now, &mut out);
        source.collect(now + Duration::from_millis(16), &mut out);
        assert_eq!(out.len(), 2);
        assert!(out[0] < out[1]);
    }

    #[test]
    fn detour_unavailable_falls_back_to_polling() {
        let source = FrameSignalSource::provision(
            SignalPolicy::Intercepted,
            GraphicsBackend::D3D11,
            Some(Box::new(DetourUnavailable)),
        );
        assert_eq!(source.policy(), SignalPolicy::Polling);
        // The interceptor survives for the next attempt.
        assert!(source.teardown().is_some());
    }

    #[test]
    fn missing_entry_point_falls_back() {
        for backend in [
            GraphicsBackend::Unknown,
            GraphicsBackend::D3D12,
            GraphicsBackend::Vulkan,
        ] {
            assert!(present_entry_point(backend).is_none());
            let source = FrameSignalSource::provision(
                SignalPolicy::Intercepted,
                backend,
                Some(Box::new(DetourUnavailable)),
            );
            assert_eq!(source.policy(), SignalPolicy::Polling);
        }
    }

    #[test]
    fn installed_interceptor_drains_queue_and_is_removed() {
        let counters = Arc::new(Counters::default());
        let interceptor = FakeInterceptor {
            counters: counters.clone(),
            queue: None,
        };
        let mut source = FrameSignalSource::provision(
            SignalPolicy::Intercepted,
            GraphicsBackend::D3D9,
            Some(Box::new(interceptor)),
        );
        assert_eq!(source.policy(), SignalPolicy::Intercepted);
        assert_eq!(counters.installs.load(Ordering::SeqCst), 1);

        let FrameSignalSource::Intercepted { queue, .. } = &source else {
            panic!("expected intercepted source");
        };
        let t0 = Instant::now();
        push_present(queue, t0);
        push_present(queue, t0 + Duration::from_millis(10));

        let mut out = Vec::new();
        source.collect(Instant::now(), &mut out);
        assert_eq!(out.len(), 2);
        out.clear();
        source.collect(Instant::now(), &mut out);
        assert!(out.is_empty());

        source.teardown();
        assert_eq!(counters.removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_is_bounded() {
        let queue: PresentQueue = Arc::new(Mutex::new(VecDeque::new()));
        let now = Instant::now();
        for _ in 0..(QUEUE_LIMIT + 10) {
            push_present(&queue, now);
        }
        assert_eq!(queue.lock().unwrap().len(), QUEUE_LIMIT);
    }

    #[test]
    fn policy_parses() {
        assert_eq!("Polling".parse::<SignalPolicy>().unwrap(), SignalPolicy::Polling);
        assert_eq!(
            "intercepted".parse::<SignalPolicy>().unwrap(),
            SignalPolicy::Intercepted
        );
        assert!("hooks".parse::<SignalPolicy>().is_err());
    }
}
