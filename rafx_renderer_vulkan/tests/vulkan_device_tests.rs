//! Integration tests for VulkanDevice
//!
//! These tests verify the `GraphicsDevice` contract on a real GPU and are
//! marked with #[ignore]. One window and one device are shared by every test
//! (winit allows a single event loop per process); a test that
//! moves the device into a context leaves the next test to recreate it.
//!
//! Run with: cargo test -p rafx_renderer_vulkan --test vulkan_device_tests -- --ignored

use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use rafx_core::rafx::headless::HeadlessCompiler;
use rafx_core::rafx::{
    BufferDesc, BufferUsage, ClearColor, ContextConfig, Format, GraphicsDevice, RenderContext, ResourceState,
    SyncModel, TextureDesc, TextureUsage,
};
use rafx_renderer_vulkan::{VulkanConfig, VulkanDevice};
use serial_test::serial;
use winit::event_loop::EventLoop;
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
#[cfg(all(unix, not(target_os = "macos")))]
use winit::platform::x11::EventLoopBuilderExtX11;

static GPU_DEVICE: Mutex<Option<VulkanDevice>> = Mutex::new(None);
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Hidden window on an event loop usable from test threads
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let mut builder = EventLoop::builder();
    #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
    builder.with_any_thread(true);
    let event_loop = builder.build().unwrap();

    let window = event_loop
        .create_window(
            Window::default_attributes()
                .with_title("rafx GPU test")
                .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
                .with_visible(false),
        )
        .unwrap();
    (window, event_loop)
}

fn test_window() -> &'static Window {
    GPU_WINDOW.get_or_init(|| {
        let (window, event_loop) = create_test_window();
        // EventLoop is not Sync; leak it to keep the window valid
        std::mem::forget(event_loop);
        window
    })
}

/// Shared device, created on first use (and again after a test consumed it)
fn lock_device() -> MutexGuard<'static, Option<VulkanDevice>> {
    let mut guard = GPU_DEVICE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.is_none() {
        let config = VulkanConfig {
            app_name: "rafx tests".to_string(),
            ..Default::default()
        };
        *guard = Some(VulkanDevice::new(test_window(), 800, 600, config).unwrap());
    }
    guard
}

fn with_device(test: impl FnOnce(&mut VulkanDevice)) {
    let mut guard = lock_device();
    test(guard.as_mut().unwrap());
}

// ============================================================================
// CAPABILITIES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_capabilities() {
    with_device(|device| {
        let caps = device.capabilities();
        assert_eq!(caps.sync_model, SyncModel::ExplicitBarriers);
        assert!(caps.max_push_constant_size >= 128);
        assert!(caps.max_bindless_textures > 0);
        assert!(caps.max_viewports >= 1);
        assert!(caps.name.starts_with("Vulkan"));
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_supports_common_formats() {
    with_device(|device| {
        let depth = TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE;
        assert!(device.supports_texture_format(Format::D32_FLOAT, depth));
        assert!(device.supports_texture_format(Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE));
        assert!(!device.supports_texture_format(Format::R32G32B32_SFLOAT, TextureUsage::SHADER_RESOURCE));
    });
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_gpu_only_buffer_upload_ticket() {
    with_device(|device| {
        let data: Vec<u8> = (0..=255).collect();
        let desc = BufferDesc::gpu_only(256, 4, BufferUsage::VERTEX);
        let created = device.create_buffer(&desc, Some(&data)).unwrap();
        let ticket = created.upload_ticket.expect("device-local upload needs a ticket");
        assert!(ticket > 0);
        assert_eq!(created.resource.size(), 256);
        device.wait_idle().unwrap();
        device.destroy_buffer(created.resource);
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_host_visible_buffer_write() {
    with_device(|device| {
        let desc = BufferDesc::cpu_to_gpu(64, 0, BufferUsage::UNIFORM);
        let created = device.create_buffer(&desc, Some(&[1u8; 64])).unwrap();
        assert!(created.upload_ticket.is_none());
        device.write_buffer(&created.resource, 32, &[7u8; 32]).unwrap();
        assert!(device.write_buffer(&created.resource, 48, &[0u8; 32]).is_err());
        device.destroy_buffer(created.resource);
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_texture_with_data_is_shader_readable() {
    with_device(|device| {
        let data: Vec<u8> = (0..64).collect();
        let desc = TextureDesc::new_2d(4, 4, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
        let created = device.create_texture(&desc, Some(&data)).unwrap();
        assert_eq!(created.initial_state, ResourceState::ShaderRead);
        assert!(created.upload_ticket.is_some());
        device.write_bindless_texture(0, Some(&created.resource));
        device.wait_idle().unwrap();
        device.write_bindless_texture(0, None);
        device.destroy_texture(created.resource);
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_depth_texture() {
    with_device(|device| {
        let desc = TextureDesc::new_2d(512, 512, Format::D32_FLOAT, TextureUsage::DEPTH_STENCIL)
            .with_name("TestDepth");
        let created = device.create_texture(&desc, None).unwrap();
        assert_eq!(created.initial_state, ResourceState::Undefined);
        assert!(created.upload_ticket.is_none());
        device.destroy_texture(created.resource);
    });
}

// ============================================================================
// FRAMES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_wait_for_serial_timeout() {
    with_device(|device| {
        let completed = device.completed_serial().unwrap();
        // Never submitted: the wait must time out rather than block
        assert!(!device.wait_for_serial(completed + 1000, Duration::from_millis(10)).unwrap());
        assert!(device.wait_for_serial(completed, Duration::from_millis(10)).unwrap());
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_resize() {
    with_device(|device| {
        device.wait_idle().unwrap();
        device.resize(1024, 768).unwrap();
        device.resize(800, 600).unwrap();
        assert!(device.swapchain().image_count >= 2);
    });
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_clear_frames_through_context() {
    let device = lock_device().take().unwrap();
    let mut context = RenderContext::new(device, HeadlessCompiler::new(), ContextConfig::default()).unwrap();

    for _ in 0..4 {
        context.begin_frame().unwrap();
        {
            let mut cmd = context.command_list().unwrap();
            cmd.begin_event("Clear");
            cmd.begin_swapchain_render_pass(ClearColor::from_rgba8(25, 25, 30, 255), Some(Format::D32_FLOAT), 1.0)
                .unwrap();
            cmd.end_render_pass().unwrap();
            cmd.end_event().unwrap();
        }
        context.end_frame().unwrap();
    }
    context.wait_idle().unwrap();
    assert!(context.backend().last_submitted_serial() >= 4);
    assert_eq!(context.backend().validation_stats().errors, 0);
}
