//! Interactive console menu.
//!
//! A dispatch table maps menu numbers to handlers. Every change is
//! pushed straight into the running scheduler's [`ConfigHandle`]; the
//! settings file is written on request and when the menu exits.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use fps_core::{
    Color, ConfigHandle, Corner, Host, OverlayState, available_backends, format_rate,
};

use crate::config::{MAX_FONT_SIZE, MIN_FONT_SIZE, OverlaySettings};
use crate::system;

/// What the menu loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Continue,
    Exit,
}

type Handler<R, W> = fn(&mut MenuContext<R, W>) -> io::Result<MenuOutcome>;

/// One numbered menu entry.
pub struct MenuCommand<R, W> {
    pub id: u32,
    pub label: &'static str,
    pub category: &'static str,
    handler: Handler<R, W>,
}

/// Everything a handler can touch.
pub struct MenuContext<R, W> {
    pub settings: OverlaySettings,
    pub config_path: PathBuf,
    pub config: ConfigHandle,
    pub state: Arc<OverlayState>,
    pub host: Arc<dyn Host>,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> MenuContext<R, W> {
    pub fn new(
        settings: OverlaySettings,
        config_path: PathBuf,
        config: ConfigHandle,
        state: Arc<OverlayState>,
        host: Arc<dyn Host>,
        input: R,
        output: W,
    ) -> Self {
        Self {
            settings,
            config_path,
            config,
            state,
            host,
            input,
            output,
        }
    }

    /// Push the current settings to the running overlay.
    fn apply(&self) {
        self.config
            .replace(self.settings.to_render_config(self.host.screen_size()));
    }

    /// Print `message` and read one trimmed line. `None` at end of input.
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{message}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_parse<T: std::str::FromStr>(&mut self, message: &str) -> io::Result<Option<T>> {
        let Some(line) = self.prompt(message)? else {
            return Ok(None);
        };
        match line.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => {
                writeln!(self.output, "Invalid input: '{line}'")?;
                Ok(None)
            }
        }
    }

    fn save(&mut self) -> io::Result<()> {
        match self.settings.save(&self.config_path) {
            Ok(()) => writeln!(self.output, "Configuration saved to {}", self.config_path.display()),
            Err(e) => {
                warn!("failed to save {}: {e}", self.config_path.display());
                writeln!(self.output, "Failed to save configuration: {e}")
            }
        }
    }

    pub fn into_settings(self) -> OverlaySettings {
        self.settings
    }
}

// ── Command table ────────────────────────────────────────────────

/// The menu, keyed by command number.
pub fn command_table<R: BufRead, W: Write>() -> BTreeMap<u32, MenuCommand<R, W>> {
    let entries: [(u32, &'static str, &'static str, Handler<R, W>); 16] = [
        (1, "Change Overlay Position", "CONFIGURATION", change_position),
        (2, "Change Font Size", "CONFIGURATION", change_font_size),
        (3, "Change Text Color", "CONFIGURATION", change_text_color),
        (4, "Change Background Color", "CONFIGURATION", change_background_color),
        (5, "Toggle Overlay", "CONFIGURATION", toggle_overlay),
        (6, "Toggle Background", "CONFIGURATION", toggle_background),
        (7, "Change Update Interval", "CONFIGURATION", change_update_interval),
        (8, "Reset to Defaults", "CONFIGURATION", reset_defaults),
        (9, "Save Configuration", "CONFIGURATION", save_configuration),
        (10, "Load Configuration", "CONFIGURATION", load_configuration),
        (11, "Show Status", "SYSTEM", show_status),
        (12, "Available Graphics APIs", "SYSTEM", show_graphics_apis),
        (13, "System Compatibility", "SYSTEM", show_compatibility),
        (14, "Process Information", "SYSTEM", show_process_info),
        (15, "Window Information", "SYSTEM", show_window_info),
        (0, "Exit", "SYSTEM", exit),
    ];

    entries
        .into_iter()
        .map(|(id, label, category, handler)| {
            (
                id,
                MenuCommand {
                    id,
                    label,
                    category,
                    handler,
                },
            )
        })
        .collect()
}

/// Run the menu until the user exits or input ends, then save.
pub fn run<R: BufRead, W: Write>(mut ctx: MenuContext<R, W>) -> io::Result<OverlaySettings> {
    let table = command_table::<R, W>();
    info!("console menu started");

    loop {
        print_menu(&mut ctx.output, &table)?;
        let Some(choice) = ctx.prompt("Select an option: ")? else {
            break;
        };
        let Ok(id) = choice.parse::<u32>() else {
            writeln!(ctx.output, "Invalid option: '{choice}'")?;
            continue;
        };
        let Some(command) = table.get(&id) else {
            writeln!(ctx.output, "Invalid option: {id}")?;
            continue;
        };
        if (command.handler)(&mut ctx)? == MenuOutcome::Exit {
            break;
        }
    }

    ctx.save()?;
    info!("console menu closed");
    Ok(ctx.into_settings())
}

fn print_menu<R, W: Write>(out: &mut W, table: &BTreeMap<u32, MenuCommand<R, W>>) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "==== FPS Overlay ====")?;
    let mut category = "";
    for command in table.values().filter(|c| c.id != 0) {
        if command.category != category {
            category = command.category;
            writeln!(out, "-- {category} --")?;
        }
        writeln!(out, "{:>3}. {}", command.id, command.label)?;
    }
    if let Some(exit) = table.get(&0) {
        writeln!(out, "{:>3}. {}", exit.id, exit.label)?;
    }
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────

fn change_position<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    for corner in Corner::ALL {
        writeln!(ctx.output, "  {}. {}", corner as u8, corner)?;
    }
    if let Some(code) = ctx.prompt_parse::<u8>("Position: ")? {
        match Corner::try_from(code) {
            Ok(corner) => {
                ctx.settings.appearance.position = corner;
                ctx.apply();
                writeln!(ctx.output, "Position set to {corner}")?;
            }
            Err(e) => writeln!(ctx.output, "{e}")?,
        }
    }
    Ok(MenuOutcome::Continue)
}

fn change_font_size<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    let message = format!("Font size ({MIN_FONT_SIZE}-{MAX_FONT_SIZE}, 0 = auto): ");
    if let Some(size) = ctx.prompt_parse::<u32>(&message)? {
        if size != 0 && !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            writeln!(ctx.output, "Font size must be between {MIN_FONT_SIZE} and {MAX_FONT_SIZE}")?;
        } else {
            ctx.settings.appearance.font_size = size;
            ctx.apply();
            writeln!(ctx.output, "Font size set to {size}")?;
        }
    }
    Ok(MenuOutcome::Continue)
}

fn read_color<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>, what: &str) -> io::Result<Option<Color>> {
    let Some(line) = ctx.prompt(&format!("{what} color as r,g,b[,a] (0.0-1.0): "))? else {
        return Ok(None);
    };
    match line.parse::<Color>() {
        Ok(color) => Ok(Some(color)),
        Err(e) => {
            writeln!(ctx.output, "Invalid input: {e}")?;
            Ok(None)
        }
    }
}

fn change_text_color<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    if let Some(color) = read_color(ctx, "Text")? {
        ctx.settings.colors.text = color;
        ctx.apply();
        writeln!(ctx.output, "Text color set to {color}")?;
    }
    Ok(MenuOutcome::Continue)
}

fn change_background_color<R: BufRead, W: Write>(
    ctx: &mut MenuContext<R, W>,
) -> io::Result<MenuOutcome> {
    if let Some(color) = read_color(ctx, "Background")? {
        ctx.settings.colors.background = color;
        ctx.apply();
        writeln!(ctx.output, "Background color set to {color}")?;
    }
    Ok(MenuOutcome::Continue)
}

fn toggle_overlay<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    ctx.settings.general.enabled = !ctx.settings.general.enabled;
    ctx.apply();
    let word = if ctx.settings.general.enabled { "enabled" } else { "disabled" };
    writeln!(ctx.output, "Overlay {word}")?;
    Ok(MenuOutcome::Continue)
}

fn toggle_background<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    ctx.settings.appearance.show_background = !ctx.settings.appearance.show_background;
    ctx.apply();
    let word = if ctx.settings.appearance.show_background { "shown" } else { "hidden" };
    writeln!(ctx.output, "Background {word}")?;
    Ok(MenuOutcome::Continue)
}

fn change_update_interval<R: BufRead, W: Write>(
    ctx: &mut MenuContext<R, W>,
) -> io::Result<MenuOutcome> {
    if let Some(ms) = ctx.prompt_parse::<u64>("Update interval in ms (50-5000): ")? {
        if (50..=5000).contains(&ms) {
            ctx.settings.general.update_interval_ms = ms;
            ctx.apply();
            writeln!(ctx.output, "Update interval set to {ms} ms")?;
        } else {
            writeln!(ctx.output, "Update interval must be between 50 and 5000 ms")?;
        }
    }
    Ok(MenuOutcome::Continue)
}

fn reset_defaults<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    // Logging is process-wide and cannot change after startup.
    let logging = ctx.settings.logging.clone();
    ctx.settings = OverlaySettings {
        logging,
        ..OverlaySettings::default()
    };
    ctx.apply();
    writeln!(ctx.output, "Settings reset to defaults")?;
    Ok(MenuOutcome::Continue)
}

fn save_configuration<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    ctx.save()?;
    Ok(MenuOutcome::Continue)
}

fn load_configuration<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    ctx.settings = OverlaySettings::load(&ctx.config_path);
    ctx.apply();
    writeln!(ctx.output, "Configuration loaded from {}", ctx.config_path.display())?;
    Ok(MenuOutcome::Continue)
}

fn show_status<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    let memory = match ctx.host.working_set_bytes() {
        Some(bytes) => format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0)),
        None => "unavailable".to_string(),
    };
    let out = &mut ctx.output;
    writeln!(out, "Frame rate:      {}", format_rate(ctx.state.current_rate()))?;
    writeln!(out, "Overlay active:  {}", if ctx.state.is_active() { "yes" } else { "no" })?;
    writeln!(out, "Graphics API:    {}", ctx.state.backend())?;
    writeln!(out, "Position:        {}", ctx.settings.appearance.position)?;
    writeln!(
        out,
        "Update interval: {} ms",
        ctx.settings.update_interval().as_millis()
    )?;
    writeln!(out, "Memory usage:    {memory}")?;
    Ok(MenuOutcome::Continue)
}

fn show_graphics_apis<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    let available = available_backends(ctx.host.as_ref());
    if available.is_empty() {
        writeln!(ctx.output, "No graphics API libraries could be loaded")?;
    } else {
        for backend in available {
            writeln!(ctx.output, "  - {backend}")?;
        }
    }
    Ok(MenuOutcome::Continue)
}

fn show_compatibility<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    writeln!(ctx.output, "=== SYSTEM COMPATIBILITY ===")?;
    system::write_compatibility(&mut ctx.output, ctx.host.as_ref())?;
    Ok(MenuOutcome::Continue)
}

fn show_process_info<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    writeln!(ctx.output, "=== PROCESS INFORMATION ===")?;
    system::write_process_info(&mut ctx.output, ctx.host.as_ref())?;
    Ok(MenuOutcome::Continue)
}

fn show_window_info<R: BufRead, W: Write>(ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    writeln!(ctx.output, "=== WINDOW INFORMATION ===")?;
    system::write_window_info(&mut ctx.output, ctx.host.as_ref())?;
    Ok(MenuOutcome::Continue)
}

fn exit<R: BufRead, W: Write>(_ctx: &mut MenuContext<R, W>) -> io::Result<MenuOutcome> {
    Ok(MenuOutcome::Exit)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use fps_core::{NativeHost, RenderConfig};

    use crate::system::tests::ScriptedHost;

    struct Session {
        _dir: tempfile::TempDir,
        path: PathBuf,
        config: ConfigHandle,
    }

    fn session() -> Session {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fps-overlay.toml");
        Session {
            _dir: dir,
            path,
            config: ConfigHandle::new(RenderConfig::default()),
        }
    }

    fn drive(s: &Session, script: &str) -> (OverlaySettings, String) {
        drive_with(s, Arc::new(NativeHost::new()), script)
    }

    fn drive_with(s: &Session, host: Arc<dyn Host>, script: &str) -> (OverlaySettings, String) {
        let mut output = Vec::new();
        let ctx = MenuContext::new(
            OverlaySettings::default(),
            s.path.clone(),
            s.config.clone(),
            Arc::new(OverlayState::new()),
            host,
            Cursor::new(script.as_bytes().to_vec()),
            &mut output,
        );
        let settings = run(ctx).unwrap();
        (settings, String::from_utf8(output).unwrap())
    }

    #[test]
    fn table_has_unique_ids_and_exit() {
        let table = command_table::<Cursor<Vec<u8>>, Vec<u8>>();
        assert_eq!(table.len(), 16);
        assert_eq!(table[&0].label, "Exit");
        assert!(table.iter().all(|(k, c)| *k == c.id));
    }

    #[test]
    fn toggle_pushes_live_config_and_saves_on_exit() {
        let s = session();
        let (settings, _) = drive(&s, "5\n0\n");
        assert!(!settings.general.enabled);
        assert!(!s.config.snapshot().enabled);
        assert!(!OverlaySettings::load(&s.path).general.enabled);
    }

    #[test]
    fn position_change() {
        let s = session();
        let (settings, out) = drive(&s, "1\n3\n0\n");
        assert_eq!(settings.appearance.position, Corner::BottomRight);
        assert_eq!(s.config.snapshot().corner, Corner::BottomRight);
        assert!(out.contains("Position set to Bottom Right"));
    }

    #[test]
    fn bad_position_is_rejected() {
        let s = session();
        let (settings, out) = drive(&s, "1\n7\n0\n");
        assert_eq!(settings.appearance.position, Corner::TopLeft);
        assert!(out.contains("not in 0..=3"));
    }

    #[test]
    fn color_change_and_invalid_color() {
        let s = session();
        let (settings, out) = drive(&s, "3\n1,0,0\n4\nblue\n0\n");
        assert_eq!(settings.colors.text, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(settings.colors.background, Color::TRANSLUCENT_BLACK);
        assert!(out.contains("Invalid input"));
    }

    #[test]
    fn font_size_bounds() {
        let s = session();
        let (settings, out) = drive(&s, "2\n200\n2\n24\n0\n");
        assert_eq!(settings.appearance.font_size, 24);
        assert_eq!(s.config.snapshot().font_size, 24);
        assert!(out.contains("Font size must be between"));
    }

    #[test]
    fn unknown_option_and_eof() {
        let s = session();
        let (settings, out) = drive(&s, "99\nabc\n6\n");
        assert!(out.contains("Invalid option: 99"));
        assert!(out.contains("Invalid option: 'abc'"));
        assert!(!settings.appearance.show_background);
        // End of input still saves.
        assert!(s.path.exists());
    }

    #[test]
    fn reset_restores_defaults() {
        let s = session();
        let (settings, _) = drive(&s, "5\n6\n8\n0\n");
        assert_eq!(settings, OverlaySettings::default());
    }

    #[test]
    fn status_reports_state() {
        let s = session();
        let (_, out) = drive(&s, "11\n0\n");
        assert!(out.contains("Frame rate:      0.0 FPS"));
        assert!(out.contains("Overlay active:  no"));
        assert!(out.contains("Graphics API:    Unknown"));
    }

    #[test]
    fn system_reports_are_dispatched() {
        let s = session();
        let (_, out) = drive_with(&s, Arc::new(ScriptedHost::windows10()), "13\n14\n15\n0\n");
        assert!(out.contains("=== SYSTEM COMPATIBILITY ==="));
        assert!(out.contains("Windows 7+:  Yes"));
        assert!(out.contains("DirectX 11:  Not Available"));
        assert!(out.contains("=== PROCESS INFORMATION ==="));
        assert!(out.contains("Thread ID:  200"));
        assert!(out.contains("=== WINDOW INFORMATION ==="));
        assert!(out.contains("Foreground window: Game"));
    }

    #[test]
    fn process_info_on_native_host() {
        let s = session();
        let (_, out) = drive(&s, "14\n0\n");
        assert!(out.contains(&format!("Process ID: {}", std::process::id())));
    }
}
