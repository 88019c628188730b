//! Single-instance enforcement.
//!
//! On Windows a named mutex marks the running overlay; a second process
//! sees `ERROR_ALREADY_EXISTS` and backs off. Elsewhere every process is
//! allowed to run.

/// Name of the process-wide mutex.
pub const MUTEX_NAME: &str = "Global\\FpsOverlayMutex";

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Foundation::*;
    use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};
    use windows::core::PCWSTR;

    use fps_core::FpsError;

    /// Held for as long as this process is the running instance.
    pub struct InstanceGuard {
        handle: HANDLE,
    }

    impl InstanceGuard {
        /// `Ok(None)` if another instance already holds the mutex.
        pub fn acquire() -> Result<Option<Self>, FpsError> {
            let name: Vec<u16> = super::MUTEX_NAME
                .encode_utf16()
                .chain(std::iter::once(0))
                .collect();

            let handle = unsafe { CreateMutexW(None, BOOL::from(true), PCWSTR(name.as_ptr())) }
                .map_err(|e| FpsError::Other(format!("CreateMutexW: {e}")))?;

            if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
                unsafe {
                    let _ = CloseHandle(handle);
                }
                return Ok(None);
            }
            Ok(Some(Self { handle }))
        }
    }

    impl Drop for InstanceGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = ReleaseMutex(self.handle);
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(target_os = "windows")]
pub use platform::InstanceGuard;

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod stub {
    use fps_core::FpsError;

    #[derive(Debug)]
    pub struct InstanceGuard;

    impl InstanceGuard {
        pub fn acquire() -> Result<Option<Self>, FpsError> {
            Ok(Some(Self))
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub use stub::InstanceGuard;
