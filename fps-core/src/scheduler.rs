//! Overlay scheduler.
//!
//! Ties detection, frame signals, statistics and the compositor together
//! on one dedicated worker thread:
//!
//! 1. Every tick (16 ms): collect frame signals, update the statistics,
//!    publish the smoothed rate, render if the overlay is enabled. The
//!    surface is hidden while the overlay is disabled.
//! 2. Every maintenance interval (1 s): check memory, re-detect the
//!    graphics backend (reprovisioning the signal source on change) and
//!    re-query the screen size (reinitializing the compositor on change).
//!
//! An error or panic inside a cycle is logged and ends the worker.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::backend::GraphicsBackend;
use crate::detect::{BackendChange, GraphicsSurfaceDetector, ModuleInventory};
use crate::error::FpsError;
use crate::host::Host;
use crate::overlay::{OverlayCompositor, ScreenSize};
use crate::shared::{ConfigHandle, OverlayState};
use crate::signal::{FrameSignalSource, SignalPolicy};
use crate::stats::FrameTimeStatistics;

// ── SchedulerConfig ──────────────────────────────────────────────

/// Timing and limits for [`OverlayScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Frame sampling and render cadence.
    pub tick_interval: Duration,
    /// How often maintenance runs.
    pub maintenance_interval: Duration,
    /// Working-set size above which a warning is logged.
    pub memory_ceiling_bytes: u64,
    pub signal_policy: SignalPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            maintenance_interval: Duration::from_millis(1000),
            memory_ceiling_bytes: 25 * 1024 * 1024,
            signal_policy: SignalPolicy::Polling,
        }
    }
}

// ── OverlayScheduler ─────────────────────────────────────────────

/// Starts and stops the overlay worker.
///
/// # Lifetime
///
/// [`start`](Self::start) spawns the worker and returns once the
/// compositor has been initialized on it. [`stop`](Self::stop) blocks
/// until the worker has torn everything down. Dropping the scheduler
/// stops it.
pub struct OverlayScheduler {
    host: Arc<dyn Host>,
    config: ConfigHandle,
    settings: SchedulerConfig,
    state: Arc<OverlayState>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl OverlayScheduler {
    pub fn new(host: Arc<dyn Host>, config: ConfigHandle, settings: SchedulerConfig) -> Self {
        Self {
            host,
            config,
            settings,
            state: Arc::new(OverlayState::new()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start the worker. A no-op (with a warning) if already running.
    ///
    /// Fails if the compositor cannot be initialized; the scheduler is
    /// then left stopped and `start` may be retried.
    pub fn start(&mut self) -> Result<(), FpsError> {
        if self.is_running() {
            warn!("overlay scheduler already running");
            return Ok(());
        }
        // Reap a worker that ended on its own.
        self.join_worker();

        let inventory: Arc<dyn ModuleInventory> = Arc::new(HostInventory(self.host.clone()));
        let mut detector = GraphicsSurfaceDetector::new(inventory);
        let backend = detector.initialize();
        self.state.set_backend(backend);
        self.state.publish_rate(0.0);

        let (ready_tx, ready_rx) = mpsc::channel();
        self.running.store(true, Ordering::SeqCst);

        let host = self.host.clone();
        let config = self.config.clone();
        let settings = self.settings.clone();
        let state = self.state.clone();
        let running = self.running.clone();

        let spawned = std::thread::Builder::new()
            .name("fps-overlay-worker".into())
            .spawn(move || {
                let flag = running.clone();
                let worker = match Worker::prepare(host, config, settings, state, running, detector) {
                    Ok(worker) => worker,
                    Err(e) => {
                        flag.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                worker.state.set_active(true);
                let _ = ready_tx.send(Ok(()));
                worker.run();
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(FpsError::Worker(format!("failed to spawn worker: {e}")));
            }
        };

        let outcome = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(FpsError::Worker("worker exited during startup".into())),
        };

        match outcome {
            Ok(()) => {
                self.worker = Some(handle);
                info!("overlay scheduler started ({backend})");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                error!("overlay scheduler failed to start: {e}");
                Err(e)
            }
        }
    }

    /// Stop the worker and wait for it to exit. A no-op (with a warning)
    /// if not running.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        self.running.store(false, Ordering::SeqCst);
        self.join_worker();
        if was_running {
            info!("overlay scheduler stopped");
        } else {
            warn!("overlay scheduler is not running");
        }
    }

    /// Whether the worker is alive and ticking.
    pub fn is_running(&self) -> bool {
        self.state.is_active()
    }

    /// Published state, shareable with other threads.
    pub fn state(&self) -> Arc<OverlayState> {
        self.state.clone()
    }

    pub fn current_rate(&self) -> f64 {
        self.state.current_rate()
    }

    pub fn backend(&self) -> GraphicsBackend {
        self.state.backend()
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("overlay worker panicked during shutdown");
            }
        }
    }
}

impl Drop for OverlayScheduler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_worker();
    }
}

/// Exposes a [`Host`] as a bare [`ModuleInventory`] for the detector.
struct HostInventory(Arc<dyn Host>);

impl ModuleInventory for HostInventory {
    fn loaded_modules(&self) -> Result<Vec<String>, FpsError> {
        self.0.loaded_modules()
    }

    fn probe_library(&self, library: &str) -> bool {
        self.0.probe_library(library)
    }
}

// ── Worker ───────────────────────────────────────────────────────

/// Everything owned by the worker thread.
struct Worker {
    host: Arc<dyn Host>,
    config: ConfigHandle,
    settings: SchedulerConfig,
    state: Arc<OverlayState>,
    running: Arc<AtomicBool>,
    detector: GraphicsSurfaceDetector,
    stats: FrameTimeStatistics,
    signals: Option<FrameSignalSource>,
    compositor: Box<dyn OverlayCompositor>,
    /// Whether the surface is currently shown.
    visible: bool,
    screen: ScreenSize,
    last_maintenance: Instant,
    pending: Vec<Instant>,
}

impl Worker {
    /// Build the compositor and signal source on the worker thread.
    fn prepare(
        host: Arc<dyn Host>,
        config: ConfigHandle,
        settings: SchedulerConfig,
        state: Arc<OverlayState>,
        running: Arc<AtomicBool>,
        detector: GraphicsSurfaceDetector,
    ) -> Result<Self, FpsError> {
        let mut compositor = host.create_compositor();
        let screen = host.screen_size().ok_or(FpsError::ScreenUnavailable)?;
        if let Err(e) = compositor.initialize(screen) {
            compositor.cleanup();
            return Err(e);
        }

        let signals = FrameSignalSource::provision(
            settings.signal_policy,
            detector.current(),
            host.create_interceptor(),
        );

        Ok(Self {
            host,
            config,
            settings,
            state,
            running,
            detector,
            stats: FrameTimeStatistics::new(),
            signals: Some(signals),
            compositor,
            visible: true,
            screen,
            last_maintenance: Instant::now(),
            pending: Vec::with_capacity(16),
        })
    }

    fn run(mut self) {
        debug!("overlay worker running");
        while self.running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            match panic::catch_unwind(AssertUnwindSafe(|| self.cycle(cycle_start))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("overlay cycle failed: {e}");
                    break;
                }
                Err(payload) => {
                    error!("overlay cycle panicked: {}", panic_message(payload.as_ref()));
                    break;
                }
            }

            self.pace(cycle_start);
        }
        self.shutdown();
    }

    fn cycle(&mut self, now: Instant) -> Result<(), FpsError> {
        // 1. Frame signals → statistics.
        self.pending.clear();
        if let Some(signals) = self.signals.as_mut() {
            signals.collect(now, &mut self.pending);
        }
        for &tick in &self.pending {
            self.stats.record_tick(tick);
        }
        let rate = self.stats.current_rate();
        self.state.publish_rate(rate);

        // 2. Render.
        let snapshot = self.config.snapshot();
        if snapshot.enabled != self.visible {
            self.compositor.set_visible(snapshot.enabled);
            self.visible = snapshot.enabled;
        }
        if snapshot.enabled {
            self.compositor.render(rate, &snapshot)?;
        }

        // 3. Maintenance.
        if now.saturating_duration_since(self.last_maintenance) >= self.settings.maintenance_interval {
            self.last_maintenance = now;
            self.maintain()?;
        }
        Ok(())
    }

    fn maintain(&mut self) -> Result<(), FpsError> {
        if let Some(bytes) = self.host.working_set_bytes() {
            if bytes > self.settings.memory_ceiling_bytes {
                warn!(
                    "memory usage {:.1} MiB exceeds ceiling of {:.1} MiB",
                    bytes as f64 / (1024.0 * 1024.0),
                    self.settings.memory_ceiling_bytes as f64 / (1024.0 * 1024.0)
                );
            }
        }

        if let BackendChange::Changed { to, .. } = self.detector.refresh() {
            self.state.set_backend(to);
            let spare = self.signals.take().and_then(FrameSignalSource::teardown);
            let interceptor = spare.or_else(|| self.host.create_interceptor());
            self.signals = Some(FrameSignalSource::provision(
                self.settings.signal_policy,
                to,
                interceptor,
            ));
        }

        if let Some(screen) = self.host.screen_size() {
            if screen != self.screen {
                info!(
                    "screen changed {}x{} -> {}x{}",
                    self.screen.width, self.screen.height, screen.width, screen.height
                );
                self.compositor.cleanup();
                self.compositor.initialize(screen)?;
                self.screen = screen;
                // The new surface starts out shown; the next cycle hides
                // it again if the overlay is disabled.
                self.visible = true;
            }
        }
        Ok(())
    }

    /// Sleep for the remainder of the tick.
    fn pace(&self, cycle_start: Instant) {
        let elapsed = cycle_start.elapsed();
        if elapsed < self.settings.tick_interval {
            std::thread::sleep(self.settings.tick_interval - elapsed);
        }
    }

    fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.state.set_active(false);
        if let Some(signals) = self.signals.take() {
            signals.teardown();
        }
        self.compositor.cleanup();
        debug!("overlay worker exited");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
