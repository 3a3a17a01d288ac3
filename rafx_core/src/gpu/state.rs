/// Logical resource states and their synchronization scopes
///
/// States are backend-neutral. Explicit backends translate the scope of a
/// state (pipeline stages + memory access) into native barriers; implicit
/// backends only need the state itself.

use bitflags::bitflags;

use crate::gpu::TextureUsage;

/// Logical usage mode of a texture at a point in the command stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Contents undefined (fresh texture, freshly acquired swapchain image)
    Undefined,
    /// Written as a color attachment
    ColorAttachment,
    /// Written as a depth attachment
    DepthWrite,
    /// Depth attachment used read-only (depth test without write)
    DepthRead,
    /// Sampled from shaders
    ShaderRead,
    /// Source of a copy
    CopySrc,
    /// Destination of a copy or upload
    CopyDst,
    /// Handed to the presentation engine
    Present,
}

/// Which part of a texture a state applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    Color,
    Depth,
    DepthStencil,
}

bitflags! {
    /// Abstract pipeline stages touched by a state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Abstract memory accesses performed in a state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const COLOR_ATTACHMENT_READ = 1 << 1;
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        const DEPTH_STENCIL_READ = 1 << 3;
        const DEPTH_STENCIL_WRITE = 1 << 4;
        const TRANSFER_READ = 1 << 5;
        const TRANSFER_WRITE = 1 << 6;
    }
}

/// Stages and accesses that must be synchronized when leaving or entering a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateScope {
    pub stages: PipelineStages,
    pub access: AccessFlags,
}

impl ResourceState {
    /// Synchronization scope of this state
    pub fn scope(&self) -> StateScope {
        let (stages, access) = match self {
            ResourceState::Undefined => (PipelineStages::TOP_OF_PIPE, AccessFlags::empty()),
            ResourceState::ColorAttachment => (
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            ResourceState::DepthWrite => (
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_READ | AccessFlags::DEPTH_STENCIL_WRITE,
            ),
            ResourceState::DepthRead => (
                PipelineStages::EARLY_FRAGMENT_TESTS
                    | PipelineStages::LATE_FRAGMENT_TESTS
                    | PipelineStages::FRAGMENT_SHADER,
                AccessFlags::DEPTH_STENCIL_READ | AccessFlags::SHADER_READ,
            ),
            ResourceState::ShaderRead => (
                PipelineStages::VERTEX_SHADER | PipelineStages::FRAGMENT_SHADER,
                AccessFlags::SHADER_READ,
            ),
            ResourceState::CopySrc => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ),
            ResourceState::CopyDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
            ResourceState::Present => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
        };
        StateScope { stages, access }
    }

    /// Whether work in this state writes the resource
    pub fn is_write(&self) -> bool {
        self.scope().access.intersects(
            AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_WRITE
                | AccessFlags::TRANSFER_WRITE,
        )
    }

    /// Usage flag a texture must carry to enter this state.
    ///
    /// `None` for states any texture may enter.
    pub fn required_usage(&self) -> Option<TextureUsage> {
        match self {
            ResourceState::ColorAttachment => Some(TextureUsage::COLOR_TARGET),
            ResourceState::DepthWrite | ResourceState::DepthRead => Some(TextureUsage::DEPTH_STENCIL),
            ResourceState::ShaderRead => Some(TextureUsage::SHADER_RESOURCE),
            ResourceState::CopySrc => Some(TextureUsage::TRANSFER_SRC),
            ResourceState::CopyDst => Some(TextureUsage::TRANSFER_DST),
            ResourceState::Undefined | ResourceState::Present => None,
        }
    }

    /// Whether a texture with `aspect` can be in this state
    pub fn allows_aspect(&self, aspect: TextureAspect) -> bool {
        match self {
            ResourceState::ColorAttachment | ResourceState::Present => aspect == TextureAspect::Color,
            ResourceState::DepthWrite | ResourceState::DepthRead => aspect != TextureAspect::Color,
            _ => true,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
