//! Rafx shadow-mapping demo
//!
//! Renders three cubes lit by an orbiting directional light. The first pass
//! draws the scene depth from the light into a 2048x2048 shadow map; the
//! second pass shades the scene on the swapchain, sampling the shadow map
//! through its bindless ID with 3x3 PCF.
//!
//! Run: `cargo run -p rafx_demo` (needs `slangc` on the PATH or `RAFX_SLANGC`)

mod scene;

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use rafx_core::rafx::{
    BufferDesc, BufferHandle, BufferUsage, ClearColor, ContextConfig, CullMode, DepthBias, Format, IndexType,
    PipelineDesc, PipelineHandle, RenderContext, ResourceState, Result, ShaderSource, TextureDesc, TextureHandle,
    TextureUsage, VertexElement,
};
use rafx_core::{rafx_error, rafx_info, rafx_warn};
use rafx_renderer_vulkan::{print_validation_stats_report, SlangCompiler, VulkanConfig, VulkanDevice};

use scene::{
    MainPush, SceneObject, ShadowPush, CUBE_INDEX_COUNT, NORMAL_OFFSET, SHADOW_MAP_SIZE, VERTEX_STRIDE,
};

const SOURCE: &str = "rafx::demo";
const TITLE: &str = "Rafx Shadow Mapping";
const SHADER_SOURCE: &str = include_str!("../shaders/shadow_mapping.slang");
const DEPTH_FORMAT: Format = Format::D32_FLOAT;

/// GPU state of the demo
struct ShadowDemo {
    context: RenderContext<VulkanDevice>,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    shadow_map: TextureHandle,
    shadow_pipeline: PipelineHandle,
    main_pipeline: PipelineHandle,
    objects: Vec<SceneObject>,
    start: Instant,
}

impl ShadowDemo {
    fn new(window: &Window) -> Result<Self> {
        let size = window.inner_size();
        let device = VulkanDevice::for_window(
            window,
            VulkanConfig {
                app_name: TITLE.to_string(),
                ..Default::default()
            },
        )?;
        let compiler = SlangCompiler::new().include_path(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"));
        let mut context = RenderContext::new(
            device,
            compiler,
            ContextConfig {
                title: TITLE.to_string(),
                width: size.width,
                height: size.height,
                ..Default::default()
            },
        )?;

        // Geometry
        let (vertices, indices) = scene::cube_mesh();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
        let vertex_buffer = context.create_buffer(
            &BufferDesc::gpu_only(vertex_bytes.len() as u64, VERTEX_STRIDE, BufferUsage::VERTEX).with_name("CubeVertices"),
            Some(vertex_bytes),
        )?;
        let index_buffer = context.create_buffer(
            &BufferDesc::gpu_only(index_bytes.len() as u64, 2, BufferUsage::INDEX).with_name("CubeIndices"),
            Some(index_bytes),
        )?;

        let shadow_map = context.create_texture(
            &TextureDesc::new_2d(
                SHADOW_MAP_SIZE,
                SHADOW_MAP_SIZE,
                DEPTH_FORMAT,
                TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            )
            .with_name("ShadowMap"),
            None,
        )?;

        // Shaders & pipelines
        let shader = context.compile_shader(&ShaderSource::new("shadow_mapping.slang", SHADER_SOURCE))?;

        let mut shadow_desc = PipelineDesc::new(shader, "vsShadow", None);
        shadow_desc.vertex_layout = vec![VertexElement::new(0, Format::R32G32B32_SFLOAT, 0, "POSITION")];
        shadow_desc.vertex_stride = VERTEX_STRIDE;
        shadow_desc.rasterizer.cull_mode = CullMode::Front;
        shadow_desc.rasterizer.depth_bias = Some(DepthBias {
            constant_factor: 1.25,
            clamp: 0.0,
            slope_factor: 1.75,
        });
        shadow_desc.depth_format = Some(DEPTH_FORMAT);
        let shadow_pipeline = context.create_pipeline(&shadow_desc)?;

        let mut main_desc = PipelineDesc::new(shader, "vsMain", Some("fsMain"));
        main_desc.vertex_layout = vec![
            VertexElement::new(0, Format::R32G32B32_SFLOAT, 0, "POSITION"),
            VertexElement::new(1, Format::R32G32B32_SFLOAT, NORMAL_OFFSET, "NORMAL"),
        ];
        main_desc.vertex_stride = VERTEX_STRIDE;
        main_desc.rasterizer.cull_mode = CullMode::Back;
        main_desc.color_formats = vec![context.swapchain_format()];
        main_desc.depth_format = Some(DEPTH_FORMAT);
        let main_pipeline = context.create_pipeline(&main_desc)?;

        let objects = scene::scene_objects();
        rafx_info!(SOURCE, "Scene ready: {} objects, shadow map {}x{}", objects.len(), SHADOW_MAP_SIZE, SHADOW_MAP_SIZE);
        Ok(Self {
            context,
            vertex_buffer,
            index_buffer,
            shadow_map,
            shadow_pipeline,
            main_pipeline,
            objects,
            start: Instant::now(),
        })
    }

    /// Record, submit and present one frame
    fn render(&mut self) -> Result<()> {
        let time = self.start.elapsed().as_secs_f32();
        let light_position = scene::light_position(time);
        let light_view_proj = scene::light_view_proj(light_position);
        let (width, height) = self.context.swapchain_extent();
        let view_proj = scene::camera_view_proj(width as f32 / height.max(1) as f32);
        let shadow_map_id = self.context.texture_id(self.shadow_map)?;

        self.context.begin_frame()?;
        {
            let mut cmd = self.context.command_list()?;

            cmd.begin_event("Shadow Pass");
            cmd.transition(self.shadow_map, ResourceState::DepthWrite)?;
            cmd.begin_render_pass(&[], Some(self.shadow_map), ClearColor([0.0; 4]), 1.0)?;
            cmd.bind_pipeline(self.shadow_pipeline)?;
            cmd.bind_vertex_buffer(self.vertex_buffer, 0)?;
            cmd.bind_index_buffer(self.index_buffer, 0, IndexType::U16)?;
            for object in &self.objects {
                cmd.push_constants_pod(&ShadowPush::new(light_view_proj, object.model))?;
                cmd.draw_indexed(CUBE_INDEX_COUNT, 1)?;
            }
            cmd.end_render_pass()?;
            cmd.end_event()?;

            cmd.begin_event("Main Pass");
            cmd.transition(self.shadow_map, ResourceState::ShaderRead)?;
            cmd.begin_swapchain_render_pass(ClearColor::from_rgba8(25, 25, 30, 255), Some(DEPTH_FORMAT), 1.0)?;
            cmd.bind_pipeline(self.main_pipeline)?;
            cmd.bind_vertex_buffer(self.vertex_buffer, 0)?;
            cmd.bind_index_buffer(self.index_buffer, 0, IndexType::U16)?;
            for object in &self.objects {
                let push = MainPush::new(view_proj, light_view_proj, light_position, object, shadow_map_id);
                cmd.push_constants_pod(&push)?;
                cmd.draw_indexed(CUBE_INDEX_COUNT, 1)?;
            }
            cmd.end_render_pass()?;
            cmd.end_event()?;
        }
        self.context.end_frame()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.context.resize(width, height)
    }
}

#[derive(Default)]
struct App {
    // Dropped before the window: the device owns the window surface
    demo: Option<ShadowDemo>,
    window: Option<Arc<Window>>,
}

impl App {
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(demo), Some(window)) = (self.demo.as_mut(), self.window.as_ref()) else {
            return;
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        match demo.render() {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                if let Err(e) = demo.resize(size.width, size.height) {
                    rafx_error!(SOURCE, "Swapchain rebuild failed: {}", e);
                    event_loop.exit();
                }
            }
            Err(e) if e.is_fatal() => {
                rafx_error!(SOURCE, "Device lost: {}", e);
                event_loop.exit();
            }
            Err(e) => rafx_warn!(SOURCE, "Frame failed: {}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                rafx_error!(SOURCE, "Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match ShadowDemo::new(&window) {
            Ok(demo) => self.demo = Some(demo),
            Err(e) => {
                rafx_error!(SOURCE, "Failed to initialize the renderer: {}", e);
                event_loop.exit();
            }
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(demo) = self.demo.as_mut() {
                    if let Err(e) = demo.resize(size.width, size.height) {
                        rafx_error!(SOURCE, "Resize to {}x{} failed: {}", size.width, size.height, e);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(demo) = self.demo.take() {
            let stats = demo.context.pipeline_cache_stats();
            rafx_info!(SOURCE, "Exiting after {} frames ({:?})", demo.context.frame_serial().saturating_sub(1), stats);
        }
        print_validation_stats_report();
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::default();
    event_loop.run_app(&mut app)?;
    Ok(())
}
