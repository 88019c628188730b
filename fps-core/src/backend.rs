//! Graphics backend identifiers.

use std::fmt;

/// The graphics API believed to be rendering in the observed process.
///
/// Produced by [`GraphicsSurfaceDetector`](crate::GraphicsSurfaceDetector)
/// and replaced wholesale on re-detection. The `u8` discriminant is
/// stable so the value can be published through an atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GraphicsBackend {
    #[default]
    Unknown = 0,
    D3D9 = 1,
    D3D11 = 2,
    D3D12 = 3,
    OpenGL = 4,
    Vulkan = 5,
}

impl GraphicsBackend {
    /// Human-readable API name.
    pub const fn name(self) -> &'static str {
        match self {
            GraphicsBackend::Unknown => "Unknown",
            GraphicsBackend::D3D9 => "DirectX 9",
            GraphicsBackend::D3D11 => "DirectX 11",
            GraphicsBackend::D3D12 => "DirectX 12",
            GraphicsBackend::OpenGL => "OpenGL",
            GraphicsBackend::Vulkan => "Vulkan",
        }
    }

    /// Inverse of `self as u8`; unknown codes map to `Unknown`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => GraphicsBackend::D3D9,
            2 => GraphicsBackend::D3D11,
            3 => GraphicsBackend::D3D12,
            4 => GraphicsBackend::OpenGL,
            5 => GraphicsBackend::Vulkan,
            _ => GraphicsBackend::Unknown,
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, GraphicsBackend::Unknown)
    }
}

impl fmt::Display for GraphicsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
