//! Persistent overlay settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fps_core::{Color, Corner, RenderConfig, SchedulerConfig, ScreenSize, SignalPolicy};

/// Font size used at 1920 px wide when auto-scaling.
const BASE_FONT_SIZE: u32 = 16;
const BASE_SCREEN_WIDTH: u32 = 1920;
pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 72;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub general: GeneralConfig,
    pub appearance: AppearanceConfig,
    pub colors: ColorConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// General switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Show the overlay.
    pub enabled: bool,
    /// Advisory refresh interval in milliseconds.
    pub update_interval_ms: u64,
}

/// Position, font and spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// 0 = top left, 1 = top right, 2 = bottom left, 3 = bottom right.
    pub position: Corner,
    /// Font height in pixels; 0 scales with the screen width.
    pub font_size: u32,
    pub font_name: String,
    pub offset_x: i32,
    pub offset_y: i32,
    pub show_background: bool,
}

/// Colors as `[r, g, b, a]` with channels in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub text: Color,
    pub background: Color,
}

/// Frame sampling and housekeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// "polling" or "intercepted".
    pub signal: SignalPolicy,
    /// Working-set warning threshold in MiB.
    pub memory_ceiling_mb: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            appearance: AppearanceConfig::default(),
            colors: ColorConfig::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_ms: 500,
        }
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            position: Corner::TopLeft,
            font_size: BASE_FONT_SIZE,
            font_name: "Consolas".into(),
            offset_x: 10,
            offset_y: 10,
            show_background: true,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            text: Color::GREEN,
            background: Color::TRANSLUCENT_BLACK,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            signal: SignalPolicy::Polling,
            memory_ceiling_mb: 25,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl OverlaySettings {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current settings to `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)?;
        tracing::info!("configuration saved to {}", path.display());
        Ok(())
    }

    /// Font size to render with: the configured size clamped to
    /// [`MIN_FONT_SIZE`]..=[`MAX_FONT_SIZE`], or auto-scaled from the
    /// screen width when 0.
    pub fn effective_font_size(&self, screen: Option<ScreenSize>) -> u32 {
        match self.appearance.font_size {
            0 => screen.map_or(BASE_FONT_SIZE, |s| scaled_font_size(s.width)),
            size => size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
        }
    }

    /// Snapshot handed to the overlay core.
    pub fn to_render_config(&self, screen: Option<ScreenSize>) -> RenderConfig {
        RenderConfig {
            enabled: self.general.enabled,
            corner: self.appearance.position,
            font_name: self.appearance.font_name.clone(),
            font_size: self.effective_font_size(screen),
            text_color: self.colors.text,
            background_color: self.colors.background,
            show_background: self.appearance.show_background,
            offset_x: self.appearance.offset_x,
            offset_y: self.appearance.offset_y,
            update_interval_ms: self.general.update_interval_ms,
        }
    }

    /// Scheduler timing and limits. `signal` overrides the configured
    /// policy for this run only and is never written back.
    pub fn to_scheduler_config(&self, signal: Option<SignalPolicy>) -> SchedulerConfig {
        SchedulerConfig {
            memory_ceiling_bytes: self.monitor.memory_ceiling_mb.max(1).saturating_mul(1024 * 1024),
            signal_policy: signal.unwrap_or(self.monitor.signal),
            ..SchedulerConfig::default()
        }
    }

    /// Advisory interval as a `Duration`.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.general.update_interval_ms)
    }
}

/// 16 px at 1920 wide, proportional elsewhere, clamped to 12..=32.
pub fn scaled_font_size(screen_width: u32) -> u32 {
    let scaled = u64::from(BASE_FONT_SIZE) * u64::from(screen_width) / u64::from(BASE_SCREEN_WIDTH);
    (scaled as u32).clamp(12, 32)
}

// ── Tests ────────────────────────────────────────────────────────
