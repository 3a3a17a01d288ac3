/// Recorded command stream
///
/// The recorder validates every call and appends one `Command` per
/// operation. Devices replay the stream in order at submission.

use crate::gpu::{BufferHandle, PipelineHandle, ResourceState, TextureAspect, TextureHandle};

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with depth range [0, 1]
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// RGBA clear color
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearColor(pub [f32; 4]);

impl ClearColor {
    /// Build from 8-bit channels
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        ])
    }
}

/// Texture referenced by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Registry texture
    Texture(TextureHandle),
    /// Swapchain image acquired for the current frame
    Swapchain,
}

/// State change of one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Barrier {
    pub target: TextureTarget,
    pub from: ResourceState,
    pub to: ResourceState,
    pub aspect: TextureAspect,
}

/// One recorded operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginEvent(String),
    EndEvent,
    /// Explicit synchronization (manual-barrier devices)
    Barrier(Barrier),
    /// New usage declaration (implicitly tracked devices)
    DeclareUsage {
        target: TextureTarget,
        state: ResourceState,
        aspect: TextureAspect,
    },
    BeginRenderPass {
        colors: Vec<TextureTarget>,
        depth: Option<TextureTarget>,
        clear_color: ClearColor,
        clear_depth: f32,
        width: u32,
        height: u32,
    },
    EndRenderPass,
    BindPipeline(PipelineHandle),
    BindVertexBuffer {
        buffer: BufferHandle,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    },
    SetViewports(Vec<Viewport>),
    SetScissor(Rect2D),
    /// Raw bytes, delivered verbatim at offset 0
    PushConstants(Vec<u8>),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
}

impl Command {
    /// Whether this command is a barrier-equivalent synchronization effect
    pub fn is_synchronization(&self) -> bool {
        matches!(self, Command::Barrier(_) | Command::DeclareUsage { .. })
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
