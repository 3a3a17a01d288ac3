/// GraphicsDevice trait - the contract every native backend implements
///
/// The render context is generic over the device, so every call on the
/// per-frame path is statically dispatched. Native objects are associated
/// types owned by the registry and the pipeline cache; the device only
/// receives borrows of them.

use std::time::Duration;

use crate::compiler::PipelineCache;
use crate::error::Result;
use crate::gpu::{
    BufferDesc, Command, CompiledShader, Format, PipelineDesc, ResourceState, TextureDesc,
    TextureUsage,
};
use crate::resource::ResourceRegistry;

/// How a device expects state changes to be expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncModel {
    /// Manual barriers between uses (Vulkan style)
    ExplicitBarriers,
    /// Usage declarations, hazards resolved by the driver
    ImplicitTracking,
}

/// Static properties of a device
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    /// Backend name for logs
    pub name: String,
    pub sync_model: SyncModel,
    /// Push-constant budget in bytes
    pub max_push_constant_size: u32,
    /// Size of the bindless texture table
    pub max_bindless_textures: u32,
    /// Maximum viewports per pipeline (1 = no multi-viewport)
    pub max_viewports: u32,
}

/// Current swapchain properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
}

/// A freshly created native resource
pub struct Created<T> {
    pub resource: T,
    /// Transfer timeline value the first use must wait for (None = already ordered)
    pub upload_ticket: Option<u64>,
    /// Logical state after creation (ShaderRead after a texture upload)
    pub initial_state: ResourceState,
}

impl<T> Created<T> {
    /// Resource ready for use, no pending upload
    pub fn ready(resource: T) -> Self {
        Self {
            resource,
            upload_ticket: None,
            initial_state: ResourceState::Undefined,
        }
    }
}

/// Native object to attach a debug name to
pub enum DebugObject<'a, D: GraphicsDevice> {
    Buffer(&'a D::Buffer),
    Texture(&'a D::Texture),
}

/// Everything a device needs to execute one frame
pub struct Submission<'a, D: GraphicsDevice> {
    /// Serial signaled when the frame completes
    pub serial: u64,
    /// Frame context slot
    pub frame_index: usize,
    /// Swapchain image targeted by the frame
    pub image_index: u32,
    /// Transfer timeline value to wait for before execution
    pub wait_transfer: Option<u64>,
    pub commands: &'a [Command],
    /// Resolves buffer and texture handles, including pending releases
    pub resources: &'a ResourceRegistry<D>,
    /// Resolves pipeline handles, including pending releases
    pub pipelines: &'a PipelineCache<D>,
}

/// Native graphics device
///
/// Implemented once per backend. Handles never cross this boundary except
/// inside a [`Submission`], which carries the resolvers.
pub trait GraphicsDevice: Sized + 'static {
    type Buffer;
    type Texture;
    type ShaderModule;
    type Pipeline;

    /// Static device properties
    fn capabilities(&self) -> &Capabilities;

    /// Whether `format` can back a texture with `usage`
    fn supports_texture_format(&self, format: Format, usage: TextureUsage) -> bool;

    /// Allocate per-frame synchronization for `count` frames in flight
    fn configure_frames(&mut self, count: usize) -> Result<()>;

    // ===== RESOURCES =====

    /// Create a buffer, uploading `initial_data` when supplied
    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Created<Self::Buffer>>;

    /// Write CPU-visible buffer memory
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<()>;

    /// Release a buffer. Called only once no pending frame uses it.
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Create a texture, uploading `initial_data` when supplied
    fn create_texture(&mut self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<Created<Self::Texture>>;

    /// Release a texture. Called only once no pending frame uses it.
    fn destroy_texture(&mut self, texture: Self::Texture);

    fn set_debug_name(&mut self, object: DebugObject<'_, Self>, name: &str);

    /// Point bindless slot `slot` at `texture` (None clears the slot)
    fn write_bindless_texture(&mut self, slot: u32, texture: Option<&Self::Texture>);

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&mut self, shader: &CompiledShader) -> Result<Self::ShaderModule>;

    fn destroy_shader_module(&mut self, module: Self::ShaderModule);

    /// Build a pipeline. The description was validated by the compiler bridge.
    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        module: &Self::ShaderModule,
        push_constant_size: u32,
    ) -> Result<Self::Pipeline>;

    /// Release a pipeline. Called only once no pending frame uses it.
    fn destroy_pipeline(&mut self, pipeline: Self::Pipeline);

    // ===== FRAMES =====

    /// Highest serial whose work has completed on the device
    fn completed_serial(&mut self) -> Result<u64>;

    /// Wait until `serial` completes. Returns false on timeout.
    fn wait_for_serial(&mut self, serial: u64, timeout: Duration) -> Result<bool>;

    /// Acquire the next swapchain image for frame slot `frame_index`
    ///
    /// # Errors
    ///
    /// `DeviceError::SwapchainOutOfDate` when the surface changed size.
    fn acquire_next_image(&mut self, frame_index: usize) -> Result<u32>;

    /// Execute one frame's commands and signal `submission.serial` on completion
    fn submit(&mut self, submission: &Submission<'_, Self>) -> Result<()>;

    /// Present the image rendered by frame slot `frame_index`
    fn present(&mut self, frame_index: usize, image_index: u32) -> Result<()>;

    fn swapchain(&self) -> SwapchainInfo;

    /// Rebuild the swapchain for a new drawable size. The device is idle.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Block until every submitted serial completed
    fn wait_idle(&mut self) -> Result<()>;
}
