//! FPS Overlay entry point.
//!
//! ```text
//! fps-overlay                        Run the overlay until Ctrl-C
//! fps-overlay --menu                 Run with the interactive console menu
//! fps-overlay --config <path>        Load a custom config TOML
//! fps-overlay --signal intercepted   Override the frame signal policy
//! fps-overlay --gen-config           Write default config to stdout
//! fps-overlay --system-info          Print platform and graphics API details
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use fps_core::{
    ConfigHandle, GraphicsSurfaceDetector, Host, ModuleInventory, NativeHost, OverlayScheduler,
    SignalPolicy,
};
use fps_overlay::config::OverlaySettings;
use fps_overlay::instance::InstanceGuard;
use fps_overlay::logging;
use fps_overlay::menu::{self, MenuContext};
use fps_overlay::system;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fps-overlay", about = "Always-on-top frame-rate overlay")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "fps-overlay.toml")]
    config: PathBuf,

    /// Show the interactive console menu.
    #[arg(short, long)]
    menu: bool,

    /// Frame signal policy ("polling" or "intercepted"), overriding the config.
    #[arg(long)]
    signal: Option<SignalPolicy>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Print system and graphics API information and exit.
    #[arg(long)]
    system_info: bool,
}

/// Why the main loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Interrupted,
    MenuClosed,
    WorkerStopped,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&OverlaySettings::default())?;
        println!("{text}");
        return Ok(());
    }

    let settings = OverlaySettings::load(&cli.config);
    // Held until exit so buffered file output is flushed.
    let log_guard = logging::init(&settings.logging)?;

    info!("fps-overlay v{}", env!("CARGO_PKG_VERSION"));

    let host: Arc<dyn Host> = Arc::new(NativeHost::new());

    if cli.system_info {
        print_system_info(&host)?;
        return Ok(());
    }

    if let Err(e) = system::check_compatibility(host.as_ref()) {
        error!("{e}");
        return Err(e.into());
    }

    let Some(guard) = InstanceGuard::acquire()? else {
        eprintln!("FPS Overlay is already running.");
        return Ok(());
    };

    let screen = host.screen_size();
    let config = ConfigHandle::new(settings.to_render_config(screen));
    let scheduler_config = settings.to_scheduler_config(cli.signal);
    let signal = scheduler_config.signal_policy;
    let mut scheduler = OverlayScheduler::new(host.clone(), config.clone(), scheduler_config);

    if let Err(e) = scheduler.start() {
        error!("could not start overlay: {e}");
        return Err(e.into());
    }
    info!("signal policy: {signal}");
    info!("config file: {}", cli.config.display());

    let state = scheduler.state();
    let mut menu_task = cli.menu.then(|| {
        let (settings, path) = (settings.clone(), cli.config.clone());
        let (config, state, host) = (config.clone(), state.clone(), host.clone());
        tokio::task::spawn_blocking(move || {
            let ctx = MenuContext::new(
                settings,
                path,
                config,
                state,
                host,
                std::io::stdin().lock(),
                std::io::stdout(),
            );
            menu::run(ctx)
        })
    });
    if !cli.menu {
        info!("overlay running; press Ctrl-C to exit");
    }

    let mut health = tokio::time::interval(Duration::from_millis(500));
    let exit = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break Exit::Interrupted;
            }
            result = async {
                match menu_task.as_mut() {
                    Some(task) => task.await,
                    None => std::future::pending().await,
                }
            } => {
                match result {
                    Ok(Ok(_)) => info!("menu closed"),
                    Ok(Err(e)) => error!("console i/o failed: {e}"),
                    Err(e) => error!("menu task failed: {e}"),
                }
                break Exit::MenuClosed;
            }
            _ = health.tick() => {
                if !state.is_active() {
                    error!("overlay worker stopped unexpectedly");
                    break Exit::WorkerStopped;
                }
            }
        }
    };

    scheduler.stop();
    drop(guard);
    info!("fps-overlay exited ({exit:?})");

    // A blocked stdin read cannot be cancelled, and the runtime would wait
    // for it on shutdown.
    if menu_task.is_some() && exit != Exit::MenuClosed {
        drop(log_guard);
        std::process::exit(if exit == Exit::WorkerStopped { 1 } else { 0 });
    }
    if exit == Exit::WorkerStopped {
        return Err("overlay worker stopped unexpectedly".into());
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────

fn print_system_info(host: &Arc<dyn Host>) -> std::io::Result<()> {
    let inventory: Arc<dyn ModuleInventory> = Arc::new(NativeHost::new());
    let detected = GraphicsSurfaceDetector::new(inventory).detect();

    println!("FPS Overlay v{}", env!("CARGO_PKG_VERSION"));
    println!("Platform:      {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    match host.screen_size() {
        Some(s) => println!("Screen:        {}x{}", s.width, s.height),
        None => println!("Screen:        unavailable"),
    }
    println!("Graphics API:  {detected}");
    match host.working_set_bytes() {
        Some(bytes) => println!("Memory:        {:.1} MiB", bytes as f64 / (1024.0 * 1024.0)),
        None => {
            warn!("process memory usage unavailable");
            println!("Memory:        unavailable");
        }
    }

    let mut out = std::io::stdout().lock();
    system::write_compatibility(&mut out, host.as_ref())?;
    system::write_process_info(&mut out, host.as_ref())
}
