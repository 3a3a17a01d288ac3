/// Texture descriptor, usage flags and texture info

use bitflags::bitflags;

use crate::error::ResourceError;
use crate::gpu::{Format, ResourceState, TextureAspect};

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Color attachment
        const COLOR_TARGET = 1 << 0;
        /// Depth/stencil attachment
        const DEPTH_STENCIL = 1 << 1;
        /// Sampled from shaders through its bindless ID
        const SHADER_RESOURCE = 1 << 2;
        /// Source of copies
        const TRANSFER_SRC = 1 << 3;
        /// Destination of copies and uploads
        const TRANSFER_DST = 1 << 4;
    }
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Depth in pixels (1 for 2D textures)
    pub depth: u32,
    /// Pixel format
    pub format: Format,
    /// Usage flags
    pub usage: TextureUsage,
    /// Optional debug name
    pub debug_name: Option<String>,
}

impl TextureDesc {
    /// 2D texture
    pub fn new_2d(width: u32, height: u32, format: Format, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            depth: 1,
            format,
            usage,
            debug_name: None,
        }
    }

    /// Attach a debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Byte size of tightly packed contents, `None` when it does not fit a u64
    pub fn data_size(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.depth as u64)?
            .checked_mul(self.format.size_bytes() as u64)
    }

    /// Check dimensions, format/usage agreement and initial contents
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<(), ResourceError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(ResourceError::InvalidDescription(format!(
                "texture has a zero dimension ({}x{}x{})",
                self.width, self.height, self.depth
            )));
        }
        if !self.format.is_texture_format() {
            return Err(ResourceError::UnsupportedFormat(self.format));
        }
        let Some(data_size) = self.data_size() else {
            return Err(ResourceError::InvalidDescription(format!(
                "texture of {}x{}x{} {:?} overflows a 64-bit size",
                self.width, self.height, self.depth, self.format
            )));
        };
        if self.usage.is_empty() {
            return Err(ResourceError::UnsupportedUsageCombination(
                "texture has no usage flags".to_string(),
            ));
        }
        if self.usage.contains(TextureUsage::COLOR_TARGET | TextureUsage::DEPTH_STENCIL) {
            return Err(ResourceError::UnsupportedUsageCombination(
                "COLOR_TARGET and DEPTH_STENCIL are exclusive".to_string(),
            ));
        }
        if self.format.is_depth() && self.usage.contains(TextureUsage::COLOR_TARGET) {
            return Err(ResourceError::UnsupportedUsageCombination(format!(
                "depth format {:?} used as COLOR_TARGET",
                self.format
            )));
        }
        if !self.format.is_depth() && self.usage.contains(TextureUsage::DEPTH_STENCIL) {
            return Err(ResourceError::UnsupportedUsageCombination(format!(
                "color format {:?} used as DEPTH_STENCIL",
                self.format
            )));
        }
        if self.usage.contains(TextureUsage::COLOR_TARGET) && !self.format.is_color_renderable() {
            return Err(ResourceError::UnsupportedFormat(self.format));
        }
        if self.depth > 1 && self.usage.intersects(TextureUsage::COLOR_TARGET | TextureUsage::DEPTH_STENCIL) {
            return Err(ResourceError::UnsupportedUsageCombination(
                "3D textures cannot be render targets".to_string(),
            ));
        }
        if let Some(data) = initial_data {
            if data.len() as u64 != data_size {
                return Err(ResourceError::InvalidDescription(format!(
                    "initial data is {} bytes, texture needs {}",
                    data.len(),
                    data_size
                )));
            }
            if self.format.is_depth() {
                return Err(ResourceError::UnsupportedUsageCombination(
                    "depth textures cannot be created with initial contents".to_string(),
                ));
            }
            // Uploaded textures start out shader-readable
            if !self.usage.contains(TextureUsage::SHADER_RESOURCE) {
                return Err(ResourceError::UnsupportedUsageCombination(
                    "textures created with initial contents need SHADER_RESOURCE".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub usage: TextureUsage,
    /// State at the end of the last recorded frame
    pub state: ResourceState,
    /// Index in the bindless table (shader-readable textures only)
    pub bindless_id: Option<u32>,
    pub debug_name: Option<String>,
}

impl TextureInfo {
    pub fn aspect(&self) -> TextureAspect {
        self.format.aspect()
    }

    pub fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.depth)
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
