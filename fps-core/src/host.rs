//! Access to the process and desktop the overlay runs in.
//!
//! The scheduler talks to the outside world only through [`Host`]:
//! module inventory, screen size, memory usage and compositor creation.
//! The console reads process and window details through the same trait.
//! [`NativeHost`] is the real implementation.

use crate::detect::ModuleInventory;
use crate::overlay::{LayeredCompositor, OverlayCompositor, ScreenSize};
use crate::signal::{DetourUnavailable, PresentInterceptor};

// ── System information ───────────────────────────────────────────

/// Operating system version as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl OsVersion {
    /// Windows 7 is NT 6.1.
    pub fn is_windows7_or_later(&self) -> bool {
        self.major > 6 || (self.major == 6 && self.minor >= 1)
    }

    pub fn is_windows10_or_later(&self) -> bool {
        self.major >= 10
    }
}

/// Identity of the overlay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// `None` where the platform exposes no thread id.
    pub thread_id: Option<u32>,
    /// `None` if the token could not be queried.
    pub elevated: Option<bool>,
}

/// Screen rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    /// Whether `self` covers all of `desktop`.
    pub fn covers(&self, desktop: &WindowRect) -> bool {
        self.left <= desktop.left
            && self.top <= desktop.top
            && self.right >= desktop.right
            && self.bottom >= desktop.bottom
    }
}

/// The window currently in the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundWindow {
    pub title: String,
    pub class: String,
    pub pid: u32,
    pub fullscreen: bool,
}

/// Everything the scheduler needs from its environment.
pub trait Host: ModuleInventory {
    /// Primary screen dimensions, or `None` if they cannot be queried.
    fn screen_size(&self) -> Option<ScreenSize>;

    /// Working-set size of the current process in bytes.
    fn working_set_bytes(&self) -> Option<u64>;

    /// Build a compositor. Called on the worker thread that will own it.
    fn create_compositor(&self) -> Box<dyn OverlayCompositor>;

    /// Present interceptor for [`SignalPolicy::Intercepted`](crate::SignalPolicy).
    fn create_interceptor(&self) -> Option<Box<dyn PresentInterceptor>> {
        None
    }

    fn os_version(&self) -> Option<OsVersion> {
        None
    }

    fn process_info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: std::process::id(),
            thread_id: None,
            elevated: None,
        }
    }

    fn foreground_window(&self) -> Option<ForegroundWindow> {
        None
    }
}

/// Host backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

impl NativeHost {
    pub fn new() -> Self {
        Self
    }
}

// ── Windows ──────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use windows::Wdk::System::SystemServices::RtlGetVersion;
    use windows::Win32::Foundation::*;
    use windows::Win32::Security::{GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation};
    use windows::Win32::System::Diagnostics::ToolHelp::*;
    use windows::Win32::System::LibraryLoader::LoadLibraryW;
    use windows::Win32::System::ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
    use windows::Win32::System::SystemInformation::OSVERSIONINFOW;
    use windows::Win32::System::Threading::{
        GetCurrentProcess, GetCurrentProcessId, GetCurrentThreadId, OpenProcessToken,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetClassNameW, GetDesktopWindow, GetForegroundWindow, GetSystemMetrics, GetWindowRect,
        GetWindowTextW, GetWindowThreadProcessId, SM_CXSCREEN, SM_CYSCREEN,
    };
    use windows::core::PCWSTR;

    use super::{ForegroundWindow, OsVersion, ProcessInfo, WindowRect};
    use crate::error::FpsError;
    use crate::overlay::ScreenSize;

    fn wide_to_string(buf: &[u16]) -> String {
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..len])
    }

    pub fn loaded_modules() -> Result<Vec<String>, FpsError> {
        let snapshot = unsafe {
            CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, GetCurrentProcessId())
        }
        .map_err(|e| FpsError::Enumeration(format!("CreateToolhelp32Snapshot: {e}")))?;

        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };
        let mut modules = Vec::new();

        let mut more = unsafe { Module32FirstW(snapshot, &mut entry) }.is_ok();
        while more {
            modules.push(wide_to_string(&entry.szModule));
            more = unsafe { Module32NextW(snapshot, &mut entry) }.is_ok();
        }

        unsafe {
            let _ = CloseHandle(snapshot);
        }

        if modules.is_empty() {
            return Err(FpsError::Enumeration("snapshot contained no modules".into()));
        }
        Ok(modules)
    }

    pub fn probe_library(library: &str) -> bool {
        let wide: Vec<u16> = library.encode_utf16().chain(std::iter::once(0)).collect();
        match unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) } {
            Ok(module) => {
                unsafe {
                    let _ = FreeLibrary(module);
                }
                true
            }
            Err(_) => false,
        }
    }

    pub fn screen_size() -> Option<ScreenSize> {
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        (w > 0 && h > 0).then(|| ScreenSize::new(w as u32, h as u32))
    }

    pub fn working_set_bytes() -> Option<u64> {
        let cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
        let mut counters = PROCESS_MEMORY_COUNTERS {
            cb,
            ..Default::default()
        };
        unsafe { GetProcessMemoryInfo(GetCurrentProcess(), &mut counters, cb) }
            .ok()
            .map(|()| counters.WorkingSetSize as u64)
    }

    /// `RtlGetVersion` is not subject to the compatibility shims that
    /// make `GetVersionExW` lie.
    pub fn os_version() -> Option<OsVersion> {
        let mut info = OSVERSIONINFOW {
            dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
            ..Default::default()
        };
        unsafe { RtlGetVersion(&mut info) }.ok().ok()?;
        Some(OsVersion {
            major: info.dwMajorVersion,
            minor: info.dwMinorVersion,
            build: info.dwBuildNumber,
        })
    }

    pub fn process_info() -> ProcessInfo {
        ProcessInfo {
            pid: unsafe { GetCurrentProcessId() },
            thread_id: Some(unsafe { GetCurrentThreadId() }),
            elevated: is_elevated(),
        }
    }

    fn is_elevated() -> Option<bool> {
        let mut token = HANDLE::default();
        unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) }.ok()?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut returned = 0u32;
        let queried = unsafe {
            GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut TOKEN_ELEVATION as *mut std::ffi::c_void),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            )
        };
        unsafe {
            let _ = CloseHandle(token);
        }
        queried.ok().map(|()| elevation.TokenIsElevated != 0)
    }

    fn window_rect(hwnd: HWND) -> Option<WindowRect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
        Some(WindowRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    pub fn foreground_window() -> Option<ForegroundWindow> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            return None;
        }

        let mut title = [0u16; 256];
        let mut class = [0u16; 256];
        let title_len = unsafe { GetWindowTextW(hwnd, &mut title) }.max(0) as usize;
        let class_len = unsafe { GetClassNameW(hwnd, &mut class) }.max(0) as usize;

        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32)) };

        let fullscreen = match (window_rect(hwnd), window_rect(unsafe { GetDesktopWindow() })) {
            (Some(window), Some(desktop)) => window.covers(&desktop),
            _ => false,
        };

        Some(ForegroundWindow {
            title: wide_to_string(&title[..title_len]),
            class: wide_to_string(&class[..class_len]),
            pid,
            fullscreen,
        })
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::{ForegroundWindow, OsVersion, ProcessInfo};
    use crate::error::FpsError;
    use crate::overlay::ScreenSize;

    pub fn loaded_modules() -> Result<Vec<String>, FpsError> {
        Err(FpsError::Unsupported("Module enumeration"))
    }

    pub fn probe_library(_library: &str) -> bool {
        false
    }

    pub fn screen_size() -> Option<ScreenSize> {
        None
    }

    /// Resident set size from `/proc/self/status`, where available.
    pub fn working_set_bytes() -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        status
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
            .map(|kib| kib * 1024)
    }

    pub fn os_version() -> Option<OsVersion> {
        None
    }

    pub fn process_info() -> ProcessInfo {
        ProcessInfo {
            pid: std::process::id(),
            thread_id: None,
            elevated: None,
        }
    }

    pub fn foreground_window() -> Option<ForegroundWindow> {
        None
    }
}

impl ModuleInventory for NativeHost {
    fn loaded_modules(&self) -> Result<Vec<String>, crate::FpsError> {
        platform::loaded_modules()
    }

    fn probe_library(&self, library: &str) -> bool {
        platform::probe_library(library)
    }
}

impl Host for NativeHost {
    fn screen_size(&self) -> Option<ScreenSize> {
        platform::screen_size()
    }

    fn working_set_bytes(&self) -> Option<u64> {
        platform::working_set_bytes()
    }

    fn create_compositor(&self) -> Box<dyn OverlayCompositor> {
        Box::new(LayeredCompositor::new())
    }

    /// No detour engine ships with the overlay, so this interceptor always
    /// refuses and the signal source falls back to polling.
    fn create_interceptor(&self) -> Option<Box<dyn PresentInterceptor>> {
        Some(Box::new(DetourUnavailable))
    }

    fn os_version(&self) -> Option<OsVersion> {
        platform::os_version()
    }

    fn process_info(&self) -> ProcessInfo {
        platform::process_info()
    }

    fn foreground_window(&self) -> Option<ForegroundWindow> {
        platform::foreground_window()
    }
}
