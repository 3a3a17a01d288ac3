/// Pixel and vertex component formats

use crate::gpu::TextureAspect;

/// Texture and vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    // Color formats
    R8_UNORM,
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    // Depth formats
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
    D32_FLOAT_S8_UINT,
    // Vertex attribute formats (R32 and RGBA32 also work as color targets)
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
}

impl Format {
    /// Whether this is a depth (or depth/stencil) format
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM | Format::D32_FLOAT | Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT
        )
    }

    /// Whether this format carries a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT)
    }

    /// Whether the format can be used as a color attachment
    pub fn is_color_renderable(&self) -> bool {
        matches!(
            self,
            Format::R8_UNORM
                | Format::R8G8B8A8_SRGB
                | Format::R8G8B8A8_UNORM
                | Format::B8G8R8A8_SRGB
                | Format::B8G8R8A8_UNORM
                | Format::R16G16B16A16_SFLOAT
                | Format::R32_SFLOAT
                | Format::R32G32B32A32_SFLOAT
                | Format::R32_UINT
        )
    }

    /// Whether the format can back a texture at all.
    ///
    /// Three-component 32-bit formats are vertex-only.
    pub fn is_texture_format(&self) -> bool {
        !matches!(self, Format::R32G32B32_SFLOAT | Format::R32G32_SFLOAT)
    }

    /// Size in bytes of one texel or one vertex element
    pub fn size_bytes(&self) -> u32 {
        match self {
            Format::R8_UNORM => 1,
            Format::D16_UNORM => 2,
            Format::R8G8B8A8_SRGB
            | Format::R8G8B8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::D32_FLOAT
            | Format::D24_UNORM_S8_UINT
            | Format::R32_SFLOAT
            | Format::R32_UINT => 4,
            Format::R16G16B16A16_SFLOAT | Format::D32_FLOAT_S8_UINT | Format::R32G32_SFLOAT => 8,
            Format::R32G32B32_SFLOAT => 12,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }

    /// Number of components
    pub fn component_count(&self) -> u32 {
        match self {
            Format::R8_UNORM | Format::D16_UNORM | Format::D32_FLOAT | Format::R32_SFLOAT | Format::R32_UINT => 1,
            Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT | Format::R32G32_SFLOAT => 2,
            Format::R32G32B32_SFLOAT => 3,
            _ => 4,
        }
    }

    /// Aspect a texture of this format exposes
    pub fn aspect(&self) -> TextureAspect {
        if self.has_stencil() {
            TextureAspect::DepthStencil
        } else if self.is_depth() {
            TextureAspect::Depth
        } else {
            TextureAspect::Color
        }
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
