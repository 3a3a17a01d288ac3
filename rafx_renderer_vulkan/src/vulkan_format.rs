/// Conversions between rafx types and Vulkan enums
///
/// Pure functions, no device access. Covered by `vulkan_format_tests.rs`.

use ash::vk;
use rafx_core::rafx::{
    AccessFlags, BufferUsage, CompareOp, CullMode, Format, FrontFace, IndexType, PipelineStages,
    PrimitiveTopology, ResourceState, ShaderStage, TextureAspect, TextureUsage,
};

// ===== FORMATS =====

/// Convert a rafx format to the Vulkan format
pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8_UNORM => vk::Format::R8_UNORM,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::D16_UNORM => vk::Format::D16_UNORM,
        Format::D32_FLOAT => vk::Format::D32_SFLOAT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        Format::R32_SFLOAT => vk::Format::R32_SFLOAT,
        Format::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32_UINT => vk::Format::R32_UINT,
    }
}

/// Convert a Vulkan surface format back to rafx (None for formats rafx does not expose)
pub fn vk_format_to_format(format: vk::Format) -> Option<Format> {
    match format {
        vk::Format::R8G8B8A8_SRGB => Some(Format::R8G8B8A8_SRGB),
        vk::Format::R8G8B8A8_UNORM => Some(Format::R8G8B8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(Format::B8G8R8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(Format::B8G8R8A8_UNORM),
        vk::Format::R16G16B16A16_SFLOAT => Some(Format::R16G16B16A16_SFLOAT),
        _ => None,
    }
}

/// Aspect flags of a texture aspect
pub fn aspect_to_vk(aspect: TextureAspect) -> vk::ImageAspectFlags {
    match aspect {
        TextureAspect::Color => vk::ImageAspectFlags::COLOR,
        TextureAspect::Depth => vk::ImageAspectFlags::DEPTH,
        TextureAspect::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}

/// Aspect used by sampled views (depth only for depth/stencil formats)
pub fn view_aspect(aspect: TextureAspect) -> vk::ImageAspectFlags {
    match aspect {
        TextureAspect::Color => vk::ImageAspectFlags::COLOR,
        TextureAspect::Depth | TextureAspect::DepthStencil => vk::ImageAspectFlags::DEPTH,
    }
}

// ===== USAGE =====

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::COLOR_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

/// Format features a texture with `usage` needs
pub fn required_format_features(usage: TextureUsage) -> vk::FormatFeatureFlags {
    let mut features = vk::FormatFeatureFlags::empty();
    if usage.contains(TextureUsage::COLOR_TARGET) {
        features |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        features |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        features |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        features |= vk::FormatFeatureFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        features |= vk::FormatFeatureFlags::TRANSFER_DST;
    }
    features
}

// ===== STATES =====

/// Image layout of a logical state
pub fn state_to_layout(state: ResourceState) -> vk::ImageLayout {
    match state {
        ResourceState::Undefined => vk::ImageLayout::UNDEFINED,
        ResourceState::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ResourceState::DepthWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ResourceState::DepthRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ResourceState::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ResourceState::CopySrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ResourceState::CopyDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ResourceState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn stages_to_vk(stages: PipelineStages) -> vk::PipelineStageFlags2 {
    const MAPPING: [(PipelineStages, vk::PipelineStageFlags2); 9] = [
        (PipelineStages::TOP_OF_PIPE, vk::PipelineStageFlags2::TOP_OF_PIPE),
        (PipelineStages::VERTEX_INPUT, vk::PipelineStageFlags2::VERTEX_INPUT),
        (PipelineStages::VERTEX_SHADER, vk::PipelineStageFlags2::VERTEX_SHADER),
        (PipelineStages::FRAGMENT_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        (PipelineStages::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS),
        (PipelineStages::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS),
        (PipelineStages::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStages::TRANSFER, vk::PipelineStageFlags2::ALL_TRANSFER),
        (PipelineStages::BOTTOM_OF_PIPE, vk::PipelineStageFlags2::BOTTOM_OF_PIPE),
    ];
    MAPPING
        .iter()
        .filter(|(stage, _)| stages.contains(*stage))
        .fold(vk::PipelineStageFlags2::NONE, |acc, (_, flag)| acc | *flag)
}

pub fn access_to_vk(access: AccessFlags) -> vk::AccessFlags2 {
    const MAPPING: [(AccessFlags, vk::AccessFlags2); 7] = [
        (AccessFlags::SHADER_READ, vk::AccessFlags2::SHADER_SAMPLED_READ),
        (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        (AccessFlags::DEPTH_STENCIL_READ, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_WRITE, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::TRANSFER_READ, vk::AccessFlags2::TRANSFER_READ),
        (AccessFlags::TRANSFER_WRITE, vk::AccessFlags2::TRANSFER_WRITE),
    ];
    MAPPING
        .iter()
        .filter(|(bit, _)| access.contains(*bit))
        .fold(vk::AccessFlags2::NONE, |acc, (_, flag)| acc | *flag)
}

/// Image barrier for a state change of `image`
///
/// Leaving `Undefined` discards the contents, so the old layout is UNDEFINED.
pub fn image_barrier(
    image: vk::Image,
    aspect: TextureAspect,
    from: ResourceState,
    to: ResourceState,
) -> vk::ImageMemoryBarrier2<'static> {
    let src = from.scope();
    let dst = to.scope();
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(stages_to_vk(src.stages))
        .src_access_mask(access_to_vk(src.access))
        .dst_stage_mask(stages_to_vk(dst.stages))
        .dst_access_mask(access_to_vk(dst.access))
        .old_layout(state_to_layout(from))
        .new_layout(state_to_layout(to))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(full_range(aspect_to_vk(aspect)))
}

pub fn full_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

// ===== PIPELINE STATE =====

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

/// Viewport with a flipped Y axis, so clip space is Y-up like the other backends
pub fn flipped_viewport(viewport: &rafx_core::rafx::Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y + viewport.height,
        width: viewport.width,
        height: -viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
