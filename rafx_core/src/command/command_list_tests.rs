//! Unit tests for command_list.rs
//!
//! Each test records through a `RenderContext` over the headless device and
//! checks either the emitted command stream or the reported misuse.

use super::*;
use crate::context::{ContextConfig, RenderContext};
use crate::error::Error;
use crate::gpu::{
    Barrier, BufferDesc, CullMode, EntryPointReflection, PipelineDesc, ShaderSource, ShaderStage,
    SyncModel, TextureAspect, VertexElement,
};
use crate::headless::{HeadlessCompiler, HeadlessConfig, HeadlessDevice};

struct Scene {
    ctx: RenderContext<HeadlessDevice>,
    shadow_map: TextureHandle,
    vbo: BufferHandle,
    ibo: BufferHandle,
    shadow_pipeline: PipelineHandle,
    main_pipeline: PipelineHandle,
}

fn compiler() -> HeadlessCompiler {
    HeadlessCompiler::new()
        .with_entry_point(
            EntryPointReflection::new("vsShadow", ShaderStage::Vertex)
                .input(0, "POSITION", Format::R32G32B32_SFLOAT)
                .push_constants(64),
        )
        .with_entry_point(
            EntryPointReflection::new("vsMain", ShaderStage::Vertex)
                .input(0, "POSITION", Format::R32G32B32_SFLOAT)
                .input(1, "NORMAL", Format::R32G32B32_SFLOAT)
                .push_constants(244),
        )
        .with_entry_point(EntryPointReflection::new("fsMain", ShaderStage::Fragment).push_constants(244))
        .with_entry_point(EntryPointReflection::new("vsFullscreen", ShaderStage::Vertex))
}

fn scene_with(config: HeadlessConfig) -> Scene {
    let mut ctx = RenderContext::new(HeadlessDevice::new(config), compiler(), ContextConfig::default()).unwrap();
    let shadow_map = ctx
        .create_texture(
            &TextureDesc::new_2d(
                256,
                256,
                Format::D32_FLOAT,
                TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            )
            .with_name("ShadowMap"),
            None,
        )
        .unwrap();
    let vbo = ctx
        .create_buffer(&BufferDesc::gpu_only(24 * 24, 24, BufferUsage::VERTEX), Some(&[0u8; 24 * 24]))
        .unwrap();
    let ibo = ctx
        .create_buffer(&BufferDesc::gpu_only(72, 0, BufferUsage::INDEX), Some(&[0u8; 72]))
        .unwrap();
    let shader = ctx
        .compile_shader(&ShaderSource::new("shadow_mapping.slang", "// scene"))
        .unwrap();

    let mut shadow = PipelineDesc::new(shader, "vsShadow", None);
    shadow.vertex_layout = vec![VertexElement::new(0, Format::R32G32B32_SFLOAT, 0, "POSITION")];
    shadow.vertex_stride = 24;
    shadow.depth_format = Some(Format::D32_FLOAT);
    shadow.rasterizer.cull_mode = CullMode::Front;
    let shadow_pipeline = ctx.create_pipeline(&shadow).unwrap();

    let mut main = PipelineDesc::new(shader, "vsMain", Some("fsMain"));
    main.vertex_layout = vec![
        VertexElement::new(0, Format::R32G32B32_SFLOAT, 0, "POSITION"),
        VertexElement::new(1, Format::R32G32B32_SFLOAT, 12, "NORMAL"),
    ];
    main.vertex_stride = 24;
    main.color_formats = vec![ctx.swapchain_format()];
    main.depth_format = Some(Format::D32_FLOAT);
    let main_pipeline = ctx.create_pipeline(&main).unwrap();

    Scene {
        ctx,
        shadow_map,
        vbo,
        ibo,
        shadow_pipeline,
        main_pipeline,
    }
}

fn scene() -> Scene {
    scene_with(HeadlessConfig::default())
}

// ============================================================================
// TRANSITIONS
// ============================================================================

#[test]
fn test_transition_emits_one_barrier_and_is_idempotent() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    assert_eq!(
        cmd.commands(),
        &[Command::Barrier(Barrier {
            target: TextureTarget::Texture(s.shadow_map),
            from: ResourceState::Undefined,
            to: ResourceState::DepthWrite,
            aspect: TextureAspect::Depth,
        })]
    );
}

#[test]
fn test_transition_requires_matching_usage() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert!(matches!(
        cmd.transition(s.shadow_map, ResourceState::ColorAttachment),
        Err(Error::State(StateError::IncompatibleUsage(_)))
    ));
    assert!(cmd.commands().is_empty());
}

#[test]
fn test_transition_inside_pass_fails() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
    assert_eq!(
        cmd.transition(s.shadow_map, ResourceState::ShaderRead).unwrap_err(),
        Error::State(StateError::TransitionInsidePass)
    );
}

#[test]
fn test_implicit_model_declares_usage() {
    let mut s = scene_with(HeadlessConfig {
        sync_model: SyncModel::ImplicitTracking,
        ..Default::default()
    });
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    assert_eq!(
        cmd.commands(),
        &[Command::DeclareUsage {
            target: TextureTarget::Texture(s.shadow_map),
            state: ResourceState::DepthWrite,
            aspect: TextureAspect::Depth,
        }]
    );
}

// ============================================================================
// RENDER PASSES
// ============================================================================

#[test]
fn test_depth_pass_requires_depth_write_state() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert_eq!(
        cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap_err(),
        Error::State(StateError::InvalidResourceState {
            expected: ResourceState::DepthWrite,
            actual: ResourceState::Undefined,
        })
    );
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
}

#[test]
fn test_empty_and_nested_passes_fail() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert_eq!(
        cmd.begin_render_pass(&[], None, ClearColor::default(), 1.0).unwrap_err(),
        Error::State(StateError::EmptyRenderPass)
    );
    cmd.begin_swapchain_render_pass(ClearColor::default(), None, 1.0).unwrap();
    assert_eq!(
        cmd.begin_swapchain_render_pass(ClearColor::default(), None, 1.0).unwrap_err(),
        Error::State(StateError::PassAlreadyActive)
    );
}

#[test]
fn test_attachment_sizes_must_match() {
    let mut s = scene();
    let color = s
        .ctx
        .create_texture(
            &TextureDesc::new_2d(128, 128, Format::R8G8B8A8_UNORM, TextureUsage::COLOR_TARGET),
            None,
        )
        .unwrap();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(color, ResourceState::ColorAttachment).unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    assert_eq!(
        cmd.begin_render_pass(&[color], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap_err(),
        Error::State(StateError::AttachmentSizeMismatch)
    );
}

#[test]
fn test_end_pass_without_pass_fails() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert_eq!(cmd.end_render_pass().unwrap_err(), Error::State(StateError::NoActivePass));
}

#[test]
fn test_swapchain_pass_creates_depth_lazily() {
    let mut s = scene();
    let textures_before = s.ctx.registry().live_texture_count();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::from_rgba8(25, 25, 30, 255), Some(Format::D32_FLOAT), 1.0)
        .unwrap();
    let syncs = cmd.commands().iter().filter(|c| c.is_synchronization()).count();
    assert_eq!(syncs, 2);
    assert!(matches!(
        cmd.commands().last(),
        Some(Command::BeginRenderPass { width: 1280, height: 720, .. })
    ));
    cmd.end_render_pass().unwrap();
    s.ctx.end_frame().unwrap();
    assert_eq!(s.ctx.registry().live_texture_count(), textures_before + 1);

    // Second frame reuses the same depth texture
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    cmd.end_render_pass().unwrap();
    s.ctx.end_frame().unwrap();
    assert_eq!(s.ctx.registry().live_texture_count(), textures_before + 1);
}

// ============================================================================
// BINDINGS
// ============================================================================

#[test]
fn test_bind_pipeline_outside_pass_fails() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert_eq!(
        cmd.bind_pipeline(s.main_pipeline).unwrap_err(),
        Error::State(StateError::NoActivePass)
    );
}

#[test]
fn test_pipeline_target_formats_must_match_pass() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
    assert_eq!(
        cmd.bind_pipeline(s.main_pipeline).unwrap_err(),
        Error::State(StateError::PipelineRenderTargetMismatch)
    );
    cmd.bind_pipeline(s.shadow_pipeline).unwrap();
    assert_eq!(cmd.bound_pipeline(), Some(s.shadow_pipeline));
}

#[test]
fn test_buffer_usage_is_checked() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    assert!(matches!(
        cmd.bind_vertex_buffer(s.ibo, 0),
        Err(Error::State(StateError::IncompatibleUsage(_)))
    ));
    assert!(matches!(
        cmd.bind_index_buffer(s.vbo, 0, IndexType::U16),
        Err(Error::State(StateError::IncompatibleUsage(_)))
    ));
}

#[test]
fn test_multi_viewport_requires_pipeline_support() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    cmd.bind_pipeline(s.main_pipeline).unwrap();
    cmd.set_viewport(Viewport::from_size(1280, 720)).unwrap();
    let two = [Viewport::from_size(640, 720), Viewport::from_size(640, 720)];
    assert_eq!(
        cmd.set_viewports(&two).unwrap_err(),
        Error::State(StateError::MultiViewportUnsupported)
    );
}

// ============================================================================
// PUSH CONSTANTS
// ============================================================================

#[test]
fn test_push_constants_need_pipeline() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    assert_eq!(
        cmd.push_constants(&[0u8; 16]).unwrap_err(),
        Error::State(StateError::NoPipelineBound)
    );
}

#[test]
fn test_push_constants_size_limits() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
    cmd.bind_pipeline(s.shadow_pipeline).unwrap();
    assert_eq!(
        cmd.push_constants(&[0u8; 300]).unwrap_err(),
        Error::State(StateError::PushConstantsTooLarge { size: 300, max: 256 })
    );
    assert_eq!(
        cmd.push_constants(&[0u8; 128]).unwrap_err(),
        Error::State(StateError::PushConstantSizeMismatch { size: 128, declared: 64 })
    );
    let bytes: Vec<u8> = (0..64).collect();
    cmd.push_constants(&bytes).unwrap();
    assert_eq!(cmd.commands().last(), Some(&Command::PushConstants(bytes)));
}

#[test]
fn test_push_constants_pod() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
    cmd.bind_pipeline(s.shadow_pipeline).unwrap();
    let light_mvp = glam::Mat4::IDENTITY;
    cmd.push_constants_pod(&light_mvp).unwrap();
    match cmd.commands().last() {
        Some(Command::PushConstants(bytes)) => {
            assert_eq!(bytes.len(), 64);
            assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
        }
        other => panic!("unexpected command {:?}", other),
    }
}

// ============================================================================
// DRAWS
// ============================================================================

#[test]
fn test_draw_indexed_requires_bindings() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    assert_eq!(
        cmd.draw_indexed(36, 1).unwrap_err(),
        Error::State(StateError::NoPipelineBound)
    );
    cmd.bind_pipeline(s.main_pipeline).unwrap();
    assert_eq!(
        cmd.draw_indexed(36, 1).unwrap_err(),
        Error::State(StateError::NoIndexBufferBound)
    );
    cmd.bind_index_buffer(s.ibo, 0, IndexType::U16).unwrap();
    assert_eq!(
        cmd.draw_indexed(36, 1).unwrap_err(),
        Error::State(StateError::NoVertexBufferBound)
    );
    cmd.bind_vertex_buffer(s.vbo, 0).unwrap();
    cmd.draw_indexed(36, 1).unwrap();
    cmd.draw_indexed_offset(6, 1, 30, 0, 0).unwrap();
}

#[test]
fn test_bindings_reset_at_pass_begin() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.transition(s.shadow_map, ResourceState::DepthWrite).unwrap();
    cmd.begin_render_pass(&[], Some(s.shadow_map), ClearColor::default(), 1.0).unwrap();
    cmd.bind_pipeline(s.shadow_pipeline).unwrap();
    cmd.bind_vertex_buffer(s.vbo, 0).unwrap();
    cmd.bind_index_buffer(s.ibo, 0, IndexType::U16).unwrap();
    cmd.draw_indexed(36, 1).unwrap();
    cmd.end_render_pass().unwrap();

    cmd.transition(s.shadow_map, ResourceState::ShaderRead).unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    assert_eq!(
        cmd.draw_indexed(36, 1).unwrap_err(),
        Error::State(StateError::NoPipelineBound)
    );
}

#[test]
fn test_draw_without_vertex_inputs_needs_no_vertex_buffer() {
    let mut s = scene();
    let shader = s
        .ctx
        .compile_shader(&ShaderSource::new("fullscreen.slang", "// tri").entry_point("vsFullscreen", ShaderStage::Vertex))
        .unwrap();
    let mut desc = PipelineDesc::new(shader, "vsFullscreen", None);
    desc.color_formats = vec![s.ctx.swapchain_format()];
    let pipeline = s.ctx.create_pipeline(&desc).unwrap();

    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), None, 1.0).unwrap();
    cmd.bind_pipeline(pipeline).unwrap();
    cmd.draw(3, 1).unwrap();
}

#[test]
fn test_destroyed_buffer_cannot_be_bound() {
    let mut s = scene();
    s.ctx.destroy_buffer(s.vbo).unwrap();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0).unwrap();
    assert!(matches!(
        cmd.bind_vertex_buffer(s.vbo, 0),
        Err(Error::Resource(crate::error::ResourceError::InvalidHandle(_)))
    ));
}

// ============================================================================
// EVENTS & QUERIES
// ============================================================================

#[test]
fn test_unbalanced_end_event_fails() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let mut cmd = s.ctx.command_list().unwrap();
    assert_eq!(cmd.end_event().unwrap_err(), Error::State(StateError::UnbalancedEvent));
    cmd.begin_event("Shadow Pass");
    cmd.end_event().unwrap();
    assert_eq!(
        cmd.commands(),
        &[Command::BeginEvent("Shadow Pass".to_string()), Command::EndEvent]
    );
}

#[test]
fn test_texture_id_and_extent_queries() {
    let mut s = scene();
    s.ctx.begin_frame().unwrap();
    let cmd = s.ctx.command_list().unwrap();
    assert_eq!(cmd.texture_id(s.shadow_map).unwrap(), 0);
    assert_eq!(cmd.swapchain_extent(), (1280, 720));
}
