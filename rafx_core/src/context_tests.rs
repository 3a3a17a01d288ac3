//! Unit tests for context.rs
//!
//! Frame loop, resize and teardown of a `RenderContext` over the headless device.

use super::*;
use crate::error::{DeviceError, Error};
use crate::gpu::{ClearColor, Command, ResourceState, TextureUsage};
use crate::headless::{CompletionMode, HeadlessCompiler, HeadlessConfig, HeadlessDevice};

fn context_with(config: HeadlessConfig, context: ContextConfig) -> Result<RenderContext<HeadlessDevice>> {
    RenderContext::new(HeadlessDevice::new(config), HeadlessCompiler::new(), context)
}

fn context() -> RenderContext<HeadlessDevice> {
    context_with(HeadlessConfig::default(), ContextConfig::default()).unwrap()
}

fn manual_context(frames_in_flight: usize) -> RenderContext<HeadlessDevice> {
    context_with(
        HeadlessConfig {
            completion: CompletionMode::Manual,
            ..Default::default()
        },
        ContextConfig {
            frames_in_flight,
            frame_timeout: Duration::from_millis(1),
            ..Default::default()
        },
    )
    .unwrap()
}

fn empty_frame(ctx: &mut RenderContext<HeadlessDevice>) -> Result<()> {
    ctx.begin_frame()?;
    ctx.end_frame()
}

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_frames_in_flight_must_be_in_range() {
    for frames_in_flight in [0, 5] {
        let result = context_with(
            HeadlessConfig::default(),
            ContextConfig {
                frames_in_flight,
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(Error::Resource(ResourceError::InvalidDescription(_)))
        ));
    }
}

#[test]
fn test_new_configures_device_frames() {
    let ctx = context_with(
        HeadlessConfig::default(),
        ContextConfig {
            frames_in_flight: 3,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ctx.backend().frames_configured(), 3);
    assert_eq!(ctx.frames().frames_in_flight(), 3);
    assert_eq!(ctx.swapchain_extent(), (1280, 720));
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
fn test_command_list_requires_active_frame() {
    let mut ctx = context();
    assert!(matches!(
        ctx.command_list(),
        Err(Error::State(StateError::NoActiveFrame))
    ));
    assert_eq!(ctx.end_frame().unwrap_err(), Error::State(StateError::NoActiveFrame));
}

#[test]
fn test_begin_frame_twice_fails() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    assert_eq!(
        ctx.begin_frame().unwrap_err(),
        Error::State(StateError::FrameAlreadyActive)
    );
    ctx.end_frame().unwrap();
}

#[test]
fn test_empty_frame_presents_swapchain() {
    let mut ctx = context();
    empty_frame(&mut ctx).unwrap();
    let device = ctx.backend();
    assert_eq!(device.presents().len(), 1);
    let frame = device.last_frame().unwrap();
    assert_eq!(frame.serial, 1);
    assert!(matches!(
        frame.commands.as_slice(),
        [Command::Barrier(b)] if b.to == ResourceState::Present
    ));
    assert_eq!(ctx.frame_state(), FrameState::Idle);
}

#[test]
fn test_serials_and_frame_index_advance() {
    let mut ctx = context();
    assert_eq!(ctx.frame_serial(), 1);
    assert_eq!(ctx.frame_index(), None);

    ctx.begin_frame().unwrap();
    assert_eq!(ctx.frame_serial(), 1);
    assert_eq!(ctx.frame_index(), Some(0));
    assert_eq!(ctx.frame_state(), FrameState::Recording);
    ctx.end_frame().unwrap();

    ctx.begin_frame().unwrap();
    assert_eq!(ctx.frame_serial(), 2);
    assert_eq!(ctx.frame_index(), Some(1));
    ctx.end_frame().unwrap();
    assert_eq!(ctx.frame_serial(), 3);
}

#[test]
fn test_open_pass_still_submits_fallback_frame() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    {
        let mut cmd = ctx.command_list().unwrap();
        cmd.begin_swapchain_render_pass(ClearColor::default(), None, 1.0).unwrap();
    }
    assert_eq!(ctx.end_frame().unwrap_err(), Error::State(StateError::PassStillActive));

    let device = ctx.backend();
    assert_eq!(device.submitted_frames().len(), 1);
    assert_eq!(device.presents().len(), 1);
    assert_eq!(device.last_frame().unwrap().commands.len(), 1);

    // The context stays usable
    empty_frame(&mut ctx).unwrap();
}

#[test]
fn test_unbalanced_event_is_reported_at_end_frame() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    ctx.command_list().unwrap().begin_event("Main Pass");
    assert_eq!(ctx.end_frame().unwrap_err(), Error::State(StateError::UnbalancedEvent));
}

#[test]
fn test_final_states_are_committed() {
    let mut ctx = context();
    let shadow_map = ctx
        .create_texture(
            &TextureDesc::new_2d(
                64,
                64,
                Format::D32_FLOAT,
                TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            ),
            None,
        )
        .unwrap();
    ctx.begin_frame().unwrap();
    {
        let mut cmd = ctx.command_list().unwrap();
        cmd.transition(shadow_map, ResourceState::DepthWrite).unwrap();
        cmd.transition(shadow_map, ResourceState::ShaderRead).unwrap();
    }
    ctx.end_frame().unwrap();
    assert_eq!(ctx.texture_info(shadow_map).unwrap().state, ResourceState::ShaderRead);

    // Already in ShaderRead: the next frame records no barrier for it
    ctx.begin_frame().unwrap();
    {
        let mut cmd = ctx.command_list().unwrap();
        cmd.transition(shadow_map, ResourceState::ShaderRead).unwrap();
        assert!(cmd.commands().is_empty());
    }
    ctx.end_frame().unwrap();
}

#[test]
fn test_frame_pacing_blocks_after_frames_in_flight() {
    let mut ctx = manual_context(2);
    empty_frame(&mut ctx).unwrap();
    empty_frame(&mut ctx).unwrap();
    // Slot 0 still holds serial 1, which never completes
    let err = ctx.begin_frame().unwrap_err();
    assert!(err.is_fatal());

    ctx.backend_mut().complete_through(1);
    empty_frame(&mut ctx).unwrap();
    assert_eq!(ctx.backend().submitted_serial(), 3);
}

#[test]
fn test_out_of_date_at_acquire_requires_resize() {
    let mut ctx = context();
    ctx.backend_mut().force_out_of_date();
    let err = ctx.begin_frame().unwrap_err();
    assert_eq!(err, Error::Device(DeviceError::SwapchainOutOfDate));
    assert!(err.is_recoverable());
    assert_eq!(ctx.frame_state(), FrameState::Idle);

    ctx.resize(800, 600).unwrap();
    empty_frame(&mut ctx).unwrap();
    assert_eq!(ctx.swapchain_extent(), (800, 600));
}

#[test]
fn test_out_of_date_at_present_counts_frame_as_submitted() {
    let mut ctx = context();
    ctx.backend_mut().force_out_of_date_at_present();
    ctx.begin_frame().unwrap();
    assert_eq!(
        ctx.end_frame().unwrap_err(),
        Error::Device(DeviceError::SwapchainOutOfDate)
    );
    assert_eq!(ctx.backend().submitted_serial(), 1);
    assert_eq!(ctx.frame_serial(), 2);
    ctx.resize(1280, 720).unwrap();
    empty_frame(&mut ctx).unwrap();
}

#[test]
fn test_device_lost_is_fatal() {
    let mut ctx = context();
    ctx.backend_mut().fail_device("hang");
    let err = ctx.begin_frame().unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_submit_failure_releases_the_frame() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    ctx.backend_mut().fail_device("hang");
    assert!(ctx.end_frame().unwrap_err().is_fatal());
    assert!(ctx.frames().active().is_none());
}

#[test]
fn test_delta_time_is_measured() {
    let mut ctx = context();
    empty_frame(&mut ctx).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    empty_frame(&mut ctx).unwrap();
    assert!(ctx.delta_time() > 0.0);
}

// ============================================================================
// RESIZE & TEARDOWN
// ============================================================================

#[test]
fn test_resize_inside_frame_fails() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    assert_eq!(
        ctx.resize(640, 480).unwrap_err(),
        Error::State(StateError::FrameAlreadyActive)
    );
    ctx.end_frame().unwrap();
}

#[test]
fn test_resize_recreates_swapchain_depth() {
    let mut ctx = context();
    ctx.begin_frame().unwrap();
    {
        let mut cmd = ctx.command_list().unwrap();
        cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0)
            .unwrap();
        cmd.end_render_pass().unwrap();
    }
    ctx.end_frame().unwrap();
    assert_eq!(ctx.backend().live_textures(), 1);

    ctx.resize(640, 480).unwrap();
    assert_eq!(ctx.backend().live_textures(), 0);
    assert_eq!(ctx.config().width, 640);

    ctx.begin_frame().unwrap();
    {
        let mut cmd = ctx.command_list().unwrap();
        cmd.begin_swapchain_render_pass(ClearColor::default(), Some(Format::D32_FLOAT), 1.0)
            .unwrap();
        assert!(matches!(
            cmd.commands().last(),
            Some(Command::BeginRenderPass { width: 640, height: 480, .. })
        ));
        cmd.end_render_pass().unwrap();
    }
    ctx.end_frame().unwrap();
    assert_eq!(ctx.backend().live_textures(), 1);
}

#[test]
fn test_destroyed_texture_released_after_frame_completes() {
    let mut ctx = manual_context(2);
    let texture = ctx
        .create_texture(
            &TextureDesc::new_2d(16, 16, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE),
            None,
        )
        .unwrap();
    ctx.begin_frame().unwrap();
    ctx.command_list().unwrap().transition(texture, ResourceState::ShaderRead).unwrap();
    ctx.end_frame().unwrap();

    ctx.destroy_texture(texture).unwrap();
    assert!(ctx.texture_info(texture).is_err());
    assert_eq!(ctx.backend().live_textures(), 1);

    // Frame 2 reconciles, but serial 1 is still pending
    empty_frame(&mut ctx).unwrap();
    assert_eq!(ctx.backend().live_textures(), 1);

    ctx.backend_mut().complete_through(1);
    empty_frame(&mut ctx).unwrap();
    assert_eq!(ctx.backend().live_textures(), 0);
}

#[test]
fn test_drop_after_device_lost_does_not_panic() {
    let mut ctx = context();
    ctx.create_texture(
        &TextureDesc::new_2d(16, 16, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE),
        None,
    )
    .unwrap();
    ctx.backend_mut().fail_device("removed");
    drop(ctx);
}
