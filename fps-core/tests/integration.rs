//! Integration tests: the scheduler lifecycle driven through a fake host
//! (scripted modules, screen size and compositor behaviour).

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fps_core::{
    ConfigHandle, FpsError, GraphicsBackend, Host, ModuleInventory, OverlayCompositor,
    OverlayScheduler, PresentEntryPoint, PresentInterceptor, PresentQueue, RenderConfig,
    SchedulerConfig, ScreenSize, SignalPolicy,
};

// ── Fake host ────────────────────────────────────────────────────

const RENDER_OK: u8 = 0;
const RENDER_ERR: u8 = 1;
const RENDER_PANIC: u8 = 2;

#[derive(Default)]
struct Shared {
    modules: Mutex<Vec<String>>,
    module_calls: AtomicUsize,
    screen: Mutex<Option<ScreenSize>>,
    fail_init: AtomicBool,
    render_mode: AtomicU8,
    intercept: AtomicBool,
    compositors: AtomicUsize,
    inits: AtomicUsize,
    renders: AtomicUsize,
    installs: AtomicUsize,
    memory_bytes: AtomicU64,
    memory_calls: AtomicUsize,
    events: Mutex<Vec<&'static str>>,
}

impl Shared {
    fn log(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }
}

struct FakeHost {
    shared: Arc<Shared>,
}

impl FakeHost {
    fn new(modules: &[&str]) -> (Arc<Self>, Arc<Shared>) {
        let shared = Arc::new(Shared::default());
        *shared.modules.lock().unwrap() = modules.iter().map(|m| m.to_string()).collect();
        *shared.screen.lock().unwrap() = Some(ScreenSize::new(1920, 1080));
        shared.memory_bytes.store(8 * 1024 * 1024, Ordering::SeqCst);
        let host = Arc::new(FakeHost {
            shared: shared.clone(),
        });
        (host, shared)
    }
}

impl ModuleInventory for FakeHost {
    fn loaded_modules(&self) -> Result<Vec<String>, FpsError> {
        self.shared.module_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.shared.modules.lock().unwrap().clone())
    }

    fn probe_library(&self, _library: &str) -> bool {
        false
    }
}

impl Host for FakeHost {
    fn screen_size(&self) -> Option<ScreenSize> {
        *self.shared.screen.lock().unwrap()
    }

    fn working_set_bytes(&self) -> Option<u64> {
        self.shared.memory_calls.fetch_add(1, Ordering::SeqCst);
        Some(self.shared.memory_bytes.load(Ordering::SeqCst))
    }

    fn create_compositor(&self) -> Box<dyn OverlayCompositor> {
        self.shared.compositors.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeCompositor {
            shared: self.shared.clone(),
            initialized: false,
        })
    }

    fn create_interceptor(&self) -> Option<Box<dyn PresentInterceptor>> {
        if !self.shared.intercept.load(Ordering::SeqCst) {
            return None;
        }
        Some(Box::new(FakeInterceptor {
            shared: self.shared.clone(),
        }))
    }
}

struct FakeCompositor {
    shared: Arc<Shared>,
    initialized: bool,
}

impl OverlayCompositor for FakeCompositor {
    fn initialize(&mut self, _screen: ScreenSize) -> Result<(), FpsError> {
        if self.shared.fail_init.load(Ordering::SeqCst) {
            return Err(FpsError::Surface("scripted failure".into()));
        }
        self.shared.inits.fetch_add(1, Ordering::SeqCst);
        self.initialized = true;
        Ok(())
    }

    fn render(&mut self, _rate: f64, _config: &RenderConfig) -> Result<(), FpsError> {
        match self.shared.render_mode.load(Ordering::SeqCst) {
            RENDER_ERR => Err(FpsError::Surface("scripted render error".into())),
            RENDER_PANIC => panic!("scripted render panic"),
            _ => {
                self.shared.renders.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.shared.log(if visible { "show" } else { "hide" });
    }

    fn cleanup(&mut self) {
        if self.initialized {
            self.shared.log("cleanup");
        }
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

struct FakeInterceptor {
    shared: Arc<Shared>,
}

impl PresentInterceptor for FakeInterceptor {
    fn name(&self) -> &str {
        "fake"
    }

    fn install(&mut self, _entry: PresentEntryPoint, _queue: PresentQueue) -> Result<(), FpsError> {
        self.shared.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&mut self) {
        self.shared.log("remove");
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn quiet_maintenance() -> SchedulerConfig {
    SchedulerConfig {
        maintenance_interval: Duration::from_secs(3600),
        ..SchedulerConfig::default()
    }
}

fn fast_maintenance() -> SchedulerConfig {
    SchedulerConfig {
        maintenance_interval: Duration::from_millis(20),
        ..SchedulerConfig::default()
    }
}

fn scheduler(host: Arc<FakeHost>, settings: SchedulerConfig) -> OverlayScheduler {
    OverlayScheduler::new(host, ConfigHandle::default(), settings)
}

/// Poll `cond` until it holds or `timeout` expires.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ── Lifecycle ────────────────────────────────────────────────────

#[test]
fn start_detects_backend_and_renders() {
    let (host, shared) = FakeHost::new(&["game.exe", "d3d9.dll", "d3d11.dll"]);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    assert!(sched.is_running());
    assert_eq!(sched.backend(), GraphicsBackend::D3D11);

    assert!(wait_until(Duration::from_secs(2), || {
        shared.renders.load(Ordering::SeqCst) >= 3
    }));
    assert!(wait_until(Duration::from_secs(2), || sched.current_rate() > 0.0));

    sched.stop();
    assert!(!sched.is_running());
}

#[test]
fn start_while_running_spawns_no_second_worker() {
    let (host, shared) = FakeHost::new(&["opengl32.dll"]);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    sched.start().unwrap();
    assert_eq!(shared.compositors.load(Ordering::SeqCst), 1);
    assert_eq!(shared.module_calls.load(Ordering::SeqCst), 1);

    sched.stop();
}

#[test]
fn restart_runs_detection_exactly_once_more() {
    let (host, shared) = FakeHost::new(&["d3d9.dll"]);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    let first = shared.module_calls.load(Ordering::SeqCst);
    sched.stop();

    sched.start().unwrap();
    assert_eq!(shared.module_calls.load(Ordering::SeqCst), first + 1);
    assert_eq!(shared.compositors.load(Ordering::SeqCst), 2);
    sched.stop();
}

#[test]
fn stop_is_idempotent() {
    let (host, shared) = FakeHost::new(&["d3d9.dll"]);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.stop();
    sched.start().unwrap();
    sched.stop();
    sched.stop();
    assert!(!sched.is_running());
    assert_eq!(*shared.events.lock().unwrap(), vec!["cleanup"]);
}

#[test]
fn init_failure_leaves_scheduler_stopped_and_retryable() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    shared.fail_init.store(true, Ordering::SeqCst);
    let mut sched = scheduler(host, quiet_maintenance());

    let err = sched.start().unwrap_err();
    assert!(matches!(err, FpsError::Surface(_)));
    assert!(!sched.is_running());

    shared.fail_init.store(false, Ordering::SeqCst);
    sched.start().unwrap();
    assert!(sched.is_running());
    sched.stop();
}

#[test]
fn missing_screen_fails_start() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    *shared.screen.lock().unwrap() = None;
    let mut sched = scheduler(host, quiet_maintenance());

    assert!(matches!(sched.start(), Err(FpsError::ScreenUnavailable)));
    assert!(!sched.is_running());
}

// ── Cycle failures ───────────────────────────────────────────────

#[test]
fn render_error_ends_the_worker() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    shared.render_mode.store(RENDER_ERR, Ordering::SeqCst);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || !sched.is_running()));
    assert!(wait_until(Duration::from_secs(2), || {
        shared.events.lock().unwrap().contains(&"cleanup")
    }));

    // The scheduler can be started again afterwards.
    shared.render_mode.store(RENDER_OK, Ordering::SeqCst);
    sched.start().unwrap();
    assert!(sched.is_running());
    sched.stop();
}

#[test]
fn render_panic_is_caught_and_ends_the_worker() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    shared.render_mode.store(RENDER_PANIC, Ordering::SeqCst);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || !sched.is_running()));
    sched.stop();
}

#[test]
fn disabled_overlay_samples_but_does_not_render() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let config = ConfigHandle::new(RenderConfig {
        enabled: false,
        ..RenderConfig::default()
    });
    let mut sched = OverlayScheduler::new(host, config.clone(), quiet_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || sched.current_rate() > 0.0));
    assert_eq!(shared.renders.load(Ordering::SeqCst), 0);
    assert_eq!(*shared.events.lock().unwrap(), vec!["hide"]);

    config.update(|c| c.enabled = true);
    assert!(wait_until(Duration::from_secs(2), || {
        shared.renders.load(Ordering::SeqCst) > 0
    }));
    sched.stop();
}

#[test]
fn disabling_hides_the_surface_and_enabling_shows_it() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let config = ConfigHandle::default();
    let mut sched = OverlayScheduler::new(host, config.clone(), quiet_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        shared.renders.load(Ordering::SeqCst) > 0
    }));
    assert!(shared.events.lock().unwrap().is_empty());

    config.update(|c| c.enabled = false);
    assert!(wait_until(Duration::from_secs(2), || {
        shared.events.lock().unwrap().contains(&"hide")
    }));
    let frozen = shared.renders.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(shared.renders.load(Ordering::SeqCst), frozen);

    config.update(|c| c.enabled = true);
    assert!(wait_until(Duration::from_secs(2), || {
        shared.renders.load(Ordering::SeqCst) > frozen
    }));
    sched.stop();
    assert_eq!(*shared.events.lock().unwrap(), vec!["hide", "show", "cleanup"]);
}

// ── Maintenance ──────────────────────────────────────────────────

#[test]
fn maintenance_checks_memory_without_stopping() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    // Well above the default ceiling: warned about, never fatal.
    shared.memory_bytes.store(64 * 1024 * 1024, Ordering::SeqCst);
    let mut sched = scheduler(host, fast_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        shared.memory_calls.load(Ordering::SeqCst) >= 3
    }));
    assert!(sched.is_running());
    sched.stop();
}

#[test]
fn quiet_maintenance_never_checks_memory() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let mut sched = scheduler(host, quiet_maintenance());

    sched.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        shared.renders.load(Ordering::SeqCst) >= 5
    }));
    assert_eq!(shared.memory_calls.load(Ordering::SeqCst), 0);
    sched.stop();
}

#[test]
fn backend_change_is_published_and_reprovisions_signals() {
    let (host, shared) = FakeHost::new(&["opengl32.dll"]);
    shared.intercept.store(true, Ordering::SeqCst);
    let settings = SchedulerConfig {
        signal_policy: SignalPolicy::Intercepted,
        ..fast_maintenance()
    };
    let mut sched = scheduler(host, settings);

    sched.start().unwrap();
    assert_eq!(sched.backend(), GraphicsBackend::OpenGL);
    assert_eq!(shared.installs.load(Ordering::SeqCst), 1);

    *shared.modules.lock().unwrap() = vec!["opengl32.dll".into(), "dxgi.dll".into()];
    assert!(wait_until(Duration::from_secs(2), || {
        sched.backend() == GraphicsBackend::D3D11
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        shared.installs.load(Ordering::SeqCst) == 2
    }));

    sched.stop();
    // Signal source is torn down before the surface.
    let events = shared.events.lock().unwrap().clone();
    assert_eq!(events, vec!["remove", "remove", "cleanup"]);
}

#[test]
fn screen_change_reinitializes_compositor() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let mut sched = scheduler(host, fast_maintenance());

    sched.start().unwrap();
    assert_eq!(shared.inits.load(Ordering::SeqCst), 1);

    *shared.screen.lock().unwrap() = Some(ScreenSize::new(2560, 1440));
    assert!(wait_until(Duration::from_secs(2), || {
        shared.inits.load(Ordering::SeqCst) == 2
    }));
    assert!(sched.is_running());
    assert_eq!(shared.compositors.load(Ordering::SeqCst), 1);
    sched.stop();
}

#[test]
fn reinit_failure_after_screen_change_ends_the_worker() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let mut sched = scheduler(host, fast_maintenance());

    sched.start().unwrap();
    shared.fail_init.store(true, Ordering::SeqCst);
    *shared.screen.lock().unwrap() = Some(ScreenSize::new(1280, 720));

    assert!(wait_until(Duration::from_secs(2), || !sched.is_running()));
    sched.stop();
    // The old surface was cleaned up before the failed re-initialization.
    assert_eq!(*shared.events.lock().unwrap(), vec!["cleanup"]);
    assert_eq!(shared.inits.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_the_scheduler_stops_the_worker() {
    let (host, shared) = FakeHost::new(&["d3d11.dll"]);
    let state = {
        let mut sched = scheduler(host, quiet_maintenance());
        sched.start().unwrap();
        sched.state()
    };
    assert!(!state.is_active());
    assert_eq!(*shared.events.lock().unwrap(), vec!["cleanup"]);
}
