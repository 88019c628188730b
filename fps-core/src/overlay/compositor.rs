//! Layered-window compositor.
//!
//! One persistent `WS_EX_LAYERED` popup, topmost, click-through and never
//! activated. Every render rasterizes the rate label into a DIB section,
//! rebuilds it as premultiplied BGRA and hands it to
//! `UpdateLayeredWindow`, which moves, resizes and repaints the window in
//! a single call.
//!
//! The window belongs to the thread that called
//! [`initialize`](OverlayCompositor::initialize); every other call must
//! come from that thread.

use super::config::RenderConfig;
use super::placement::{OverlayPlacement, OverlaySize, ScreenSize, compute_placement};
use crate::error::FpsError;

/// Owner of the overlay surface.
pub trait OverlayCompositor {
    /// Create the surface (or adopt new screen dimensions if it exists).
    fn initialize(&mut self, screen: ScreenSize) -> Result<(), FpsError>;

    /// Paint `rate` using `config` and move the surface into place.
    fn render(&mut self, rate: f64, config: &RenderConfig) -> Result<(), FpsError>;

    /// Show or hide the surface without destroying it. A freshly
    /// initialized surface is visible.
    fn set_visible(&mut self, visible: bool);

    /// Destroy the surface. Safe to call repeatedly.
    fn cleanup(&mut self);

    fn is_initialized(&self) -> bool;
}

/// Placement for a label whose measured extent is `text_extent`
/// (`None` if measurement failed).
pub fn layout(
    text_extent: Option<(u32, u32)>,
    screen: ScreenSize,
    config: &RenderConfig,
) -> OverlayPlacement {
    let size = match text_extent {
        Some((w, h)) if w > 0 && h > 0 => OverlaySize::padded(w, h),
        _ => OverlaySize::FALLBACK,
    };
    compute_placement(screen, size, config.corner, config.offset_x, config.offset_y)
}

// ── Windows ──────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use tracing::{debug, info, warn};
    use windows::Win32::Foundation::*;
    use windows::Win32::Graphics::Gdi::*;
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::*;
    use windows::core::{PCWSTR, w};

    use super::layout;
    use crate::error::FpsError;
    use crate::overlay::config::RenderConfig;
    use crate::overlay::paint::{compose_layer, format_rate};
    use crate::overlay::placement::{PADDING_X, PADDING_Y, ScreenSize};

    const CLASS_NAME: PCWSTR = w!("FpsOverlayLayer");

    unsafe extern "system" fn wndproc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE as isize),
            WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
            _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        }
    }

    /// A realised font and the request it was built for.
    struct CachedFont {
        name: String,
        size: u32,
        handle: HGDIOBJ,
        /// Stock objects must not be deleted.
        owned: bool,
    }

    impl CachedFont {
        fn release(self) {
            if self.owned {
                unsafe {
                    let _ = DeleteObject(self.handle);
                }
            }
        }
    }

    /// GDI objects for one render, released on drop.
    struct FrameDc {
        screen: HDC,
        memory: HDC,
        old_font: Option<HGDIOBJ>,
        old_bitmap: Option<HGDIOBJ>,
        bitmap: Option<HBITMAP>,
    }

    impl FrameDc {
        fn new() -> Result<Self, FpsError> {
            let screen = unsafe { GetDC(None) };
            if screen.is_invalid() {
                return Err(FpsError::Surface("GetDC failed".into()));
            }
            let memory = unsafe { CreateCompatibleDC(screen) };
            if memory.is_invalid() {
                unsafe { ReleaseDC(None, screen) };
                return Err(FpsError::Surface("CreateCompatibleDC failed".into()));
            }
            Ok(Self {
                screen,
                memory,
                old_font: None,
                old_bitmap: None,
                bitmap: None,
            })
        }
    }

    impl Drop for FrameDc {
        fn drop(&mut self) {
            unsafe {
                if let Some(old) = self.old_bitmap.take() {
                    SelectObject(self.memory, old);
                }
                if let Some(old) = self.old_font.take() {
                    SelectObject(self.memory, old);
                }
                if let Some(bitmap) = self.bitmap.take() {
                    let _ = DeleteObject(bitmap);
                }
                let _ = DeleteDC(self.memory);
                ReleaseDC(None, self.screen);
            }
        }
    }

    /// Per-pixel-alpha overlay window driven through GDI.
    pub struct LayeredCompositor {
        hwnd: Option<HWND>,
        hinstance: HINSTANCE,
        screen: ScreenSize,
        font: Option<CachedFont>,
    }

    impl LayeredCompositor {
        pub fn new() -> Self {
            Self {
                hwnd: None,
                hinstance: HINSTANCE::default(),
                screen: ScreenSize::new(0, 0),
                font: None,
            }
        }

        fn create_window(&mut self) -> Result<HWND, FpsError> {
            let module = unsafe { GetModuleHandleW(None) }
                .map_err(|e| FpsError::Surface(format!("GetModuleHandleW: {e}")))?;
            self.hinstance = module.into();

            let wc = WNDCLASSW {
                lpfnWndProc: Some(wndproc),
                hInstance: self.hinstance,
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };
            let atom = unsafe { RegisterClassW(&wc) };
            if atom == 0 && unsafe { GetLastError() } != ERROR_CLASS_ALREADY_EXISTS {
                return Err(FpsError::Surface("RegisterClassW failed".into()));
            }

            let hwnd = unsafe {
                CreateWindowExW(
                    WS_EX_LAYERED
                        | WS_EX_TRANSPARENT
                        | WS_EX_TOPMOST
                        | WS_EX_NOACTIVATE
                        | WS_EX_TOOLWINDOW,
                    CLASS_NAME,
                    w!("FPS Overlay"),
                    WS_POPUP | WS_VISIBLE,
                    0,
                    0,
                    1,
                    1,
                    None,
                    None,
                    self.hinstance,
                    None,
                )
            }
            .map_err(|e| FpsError::Surface(format!("CreateWindowExW failed: {e}")))?;

            if hwnd.is_invalid() {
                return Err(FpsError::Surface(
                    "CreateWindowExW returned invalid HWND".into(),
                ));
            }
            Ok(hwnd)
        }

        /// Font for `config`, realised on first use and cached by name and size.
        fn font_for(&mut self, config: &RenderConfig) -> HGDIOBJ {
            if let Some(cached) = &self.font {
                if cached.name == config.font_name && cached.size == config.font_size {
                    return cached.handle;
                }
            }
            if let Some(stale) = self.font.take() {
                stale.release();
            }

            let mut face = [0u16; 32];
            for (dst, src) in face
                .iter_mut()
                .take(31)
                .zip(config.font_name.encode_utf16())
            {
                *dst = src;
            }
            let logfont = LOGFONTW {
                lfHeight: -(config.font_size.max(1) as i32),
                lfWeight: 700,
                lfQuality: ANTIALIASED_QUALITY,
                lfFaceName: face,
                ..Default::default()
            };

            let created = unsafe { CreateFontIndirectW(&logfont) };
            let cached = if created.is_invalid() {
                warn!(
                    "could not create font '{}' ({}px), using default GUI font",
                    config.font_name, config.font_size
                );
                CachedFont {
                    name: config.font_name.clone(),
                    size: config.font_size,
                    handle: unsafe { GetStockObject(DEFAULT_GUI_FONT) },
                    owned: false,
                }
            } else {
                debug!("realised font '{}' {}px", config.font_name, config.font_size);
                CachedFont {
                    name: config.font_name.clone(),
                    size: config.font_size,
                    handle: HGDIOBJ(created.0),
                    owned: true,
                }
            };
            let handle = cached.handle;
            self.font = Some(cached);
            handle
        }

        fn pump_messages(&self, hwnd: HWND) {
            unsafe {
                let mut msg = MSG::default();
                while PeekMessageW(&mut msg, hwnd, 0, 0, PM_REMOVE).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }

    impl Default for LayeredCompositor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl super::OverlayCompositor for LayeredCompositor {
        fn initialize(&mut self, screen: ScreenSize) -> Result<(), FpsError> {
            if screen.width == 0 || screen.height == 0 {
                return Err(FpsError::ScreenUnavailable);
            }
            self.screen = screen;
            if self.hwnd.is_none() {
                self.hwnd = Some(self.create_window()?);
                info!("overlay surface created for {}x{}", screen.width, screen.height);
            } else {
                debug!("overlay surface adopted {}x{}", screen.width, screen.height);
            }
            Ok(())
        }

        fn render(&mut self, rate: f64, config: &RenderConfig) -> Result<(), FpsError> {
            let Some(hwnd) = self.hwnd else {
                return Err(FpsError::Surface("render before initialize".into()));
            };

            let label: Vec<u16> = format_rate(rate).encode_utf16().collect();
            let font = self.font_for(config);
            let mut dc = FrameDc::new()?;

            unsafe {
                dc.old_font = Some(SelectObject(dc.memory, font));
            }

            let mut extent = SIZE::default();
            let measured = unsafe { GetTextExtentPoint32W(dc.memory, &label, &mut extent) }
                .as_bool()
                .then_some((extent.cx.max(0) as u32, extent.cy.max(0) as u32));
            let placement = layout(measured, self.screen, config);

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: placement.width as i32,
                    // Top-down rows.
                    biHeight: -(placement.height as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
            let bitmap = unsafe {
                CreateDIBSection(dc.memory, &bmi, DIB_RGB_COLORS, &mut bits, None, 0)
            }
            .map_err(|e| FpsError::Surface(format!("CreateDIBSection: {e}")))?;
            dc.bitmap = Some(bitmap);
            if bits.is_null() {
                return Err(FpsError::Surface("DIB section has no pixel buffer".into()));
            }

            let len = placement.width as usize * placement.height as usize * 4;
            unsafe {
                dc.old_bitmap = Some(SelectObject(dc.memory, bitmap));
                std::ptr::write_bytes(bits as *mut u8, 0, len);

                SetBkMode(dc.memory, TRANSPARENT);
                SetTextColor(dc.memory, COLORREF(0x00FF_FFFF));
                let _ = TextOutW(
                    dc.memory,
                    (PADDING_X / 2) as i32,
                    (PADDING_Y / 2) as i32,
                    &label,
                );
                let _ = GdiFlush();
            }

            let pixels = unsafe { std::slice::from_raw_parts_mut(bits as *mut u8, len) };
            let background = config.show_background.then_some(config.background_color);
            compose_layer(pixels, config.text_color, background);

            let dst = POINT {
                x: placement.x,
                y: placement.y,
            };
            let size = SIZE {
                cx: placement.width as i32,
                cy: placement.height as i32,
            };
            let src = POINT { x: 0, y: 0 };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };

            unsafe {
                UpdateLayeredWindow(
                    hwnd,
                    dc.screen,
                    Some(&dst as *const POINT),
                    Some(&size as *const SIZE),
                    dc.memory,
                    Some(&src as *const POINT),
                    COLORREF(0),
                    Some(&blend as *const BLENDFUNCTION),
                    ULW_ALPHA,
                )
            }
            .map_err(|e| FpsError::Surface(format!("UpdateLayeredWindow: {e}")))?;

            drop(dc);
            self.pump_messages(hwnd);
            Ok(())
        }

        fn set_visible(&mut self, visible: bool) {
            let Some(hwnd) = self.hwnd else {
                return;
            };
            let command = if visible { SW_SHOWNOACTIVATE } else { SW_HIDE };
            unsafe {
                let _ = ShowWindow(hwnd, command);
            }
            debug!("overlay surface {}", if visible { "shown" } else { "hidden" });
        }

        fn cleanup(&mut self) {
            if let Some(font) = self.font.take() {
                font.release();
            }
            let Some(hwnd) = self.hwnd.take() else {
                return;
            };
            unsafe {
                let _ = DestroyWindow(hwnd);
                // Fails harmlessly while another overlay window still uses the class.
                let _ = UnregisterClassW(CLASS_NAME, self.hinstance);
            }
            info!("overlay surface destroyed");
        }

        fn is_initialized(&self) -> bool {
            self.hwnd.is_some()
        }
    }

    impl Drop for LayeredCompositor {
        fn drop(&mut self) {
            super::OverlayCompositor::cleanup(self);
        }
    }
}

#[cfg(target_os = "windows")]
pub use platform::LayeredCompositor;

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod stub {
    use super::OverlayCompositor;
    use crate::error::FpsError;
    use crate::overlay::config::RenderConfig;
    use crate::overlay::placement::ScreenSize;

    #[derive(Debug, Default)]
    pub struct LayeredCompositor;

    impl LayeredCompositor {
        pub fn new() -> Self {
            Self
        }
    }

    impl OverlayCompositor for LayeredCompositor {
        fn initialize(&mut self, _screen: ScreenSize) -> Result<(), FpsError> {
            Err(FpsError::Unsupported("Overlay rendering"))
        }

        fn render(&mut self, _rate: f64, _config: &RenderConfig) -> Result<(), FpsError> {
            Err(FpsError::Unsupported("Overlay rendering"))
        }

        fn set_visible(&mut self, _visible: bool) {}

        fn cleanup(&mut self) {}

        fn is_initialized(&self) -> bool {
            false
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub use stub::LayeredCompositor;
