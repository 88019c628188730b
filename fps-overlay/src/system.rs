//! System compatibility and diagnostic reports.
//!
//! Shared by the console menu and `--system-info`. Every report reads the
//! machine through [`Host`], so the text can be checked against a
//! scripted host.

use std::io::{self, Write};

use tracing::info;

use fps_core::{FpsError, GraphicsBackend, Host, available_backends};

/// Backends the compatibility report always lists, in probe order.
const REPORTED_BACKENDS: [GraphicsBackend; 3] = [
    GraphicsBackend::D3D9,
    GraphicsBackend::D3D11,
    GraphicsBackend::OpenGL,
];

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Startup gate: Windows 7 or later (when the version is known) and at
/// least one loadable graphics API. Returns the available APIs.
pub fn check_compatibility(host: &dyn Host) -> Result<Vec<GraphicsBackend>, FpsError> {
    if let Some(version) = host.os_version() {
        if !version.is_windows7_or_later() {
            return Err(FpsError::Incompatible(format!(
                "Windows 7 or later required (found {}.{})",
                version.major, version.minor
            )));
        }
    }

    let available = available_backends(host);
    if available.is_empty() {
        return Err(FpsError::Incompatible("no compatible graphics APIs found".into()));
    }

    let names: Vec<&str> = available.iter().map(|b| b.name()).collect();
    info!("available graphics APIs: {}", names.join(", "));
    Ok(available)
}

pub fn write_compatibility<W: Write>(out: &mut W, host: &dyn Host) -> io::Result<()> {
    match host.os_version() {
        Some(v) => {
            writeln!(out, "OS version:  {}.{} (build {})", v.major, v.minor, v.build)?;
            writeln!(out, "Windows 7+:  {}", yes_no(v.is_windows7_or_later()))?;
            writeln!(out, "Windows 10+: {}", yes_no(v.is_windows10_or_later()))?;
        }
        None => writeln!(out, "OS version:  unavailable")?,
    }

    let available = available_backends(host);
    for backend in REPORTED_BACKENDS {
        let status = if available.contains(&backend) { "Available" } else { "Not Available" };
        writeln!(out, "{:<12} {status}", format!("{backend}:"))?;
    }
    Ok(())
}

pub fn write_process_info<W: Write>(out: &mut W, host: &dyn Host) -> io::Result<()> {
    let info = host.process_info();
    writeln!(out, "Process ID: {}", info.pid)?;
    match info.thread_id {
        Some(tid) => writeln!(out, "Thread ID:  {tid}")?,
        None => writeln!(out, "Thread ID:  unavailable")?,
    }
    match info.elevated {
        Some(elevated) => writeln!(out, "Elevated:   {}", yes_no(elevated))?,
        None => writeln!(out, "Elevated:   unknown")?,
    }
    Ok(())
}

pub fn write_window_info<W: Write>(out: &mut W, host: &dyn Host) -> io::Result<()> {
    let Some(window) = host.foreground_window() else {
        return writeln!(out, "No foreground window detected.");
    };
    writeln!(out, "Foreground window: {}", window.title)?;
    writeln!(out, "Class:             {}", window.class)?;
    writeln!(out, "Process ID:        {}", window.pid)?;
    writeln!(out, "Fullscreen:        {}", yes_no(window.fullscreen))?;
    Ok(())
}
