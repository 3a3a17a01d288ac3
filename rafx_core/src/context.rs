/// RenderContext - the explicitly owned root of a rafx renderer
///
/// Owns the device, the shader compiler, the resource registry, the pipeline
/// cache and the frames-in-flight ring. Created with [`RenderContext::new`],
/// torn down by `Drop` (wait for idle, then release every resource).
///
/// # Frame loop
///
/// ```ignore
/// ctx.begin_frame()?;
/// {
///     let mut cmd = ctx.command_list()?;
///     cmd.begin_swapchain_render_pass(clear, Some(Format::D32_FLOAT), 1.0)?;
///     cmd.bind_pipeline(pipeline)?;
///     cmd.draw(3, 1)?;
///     cmd.end_render_pass()?;
/// }
/// ctx.end_frame()?;
/// ```

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::command::{CommandList, CommandRecorder};
use crate::compiler::{PipelineCache, PipelineCacheStats};
use crate::error::{ResourceError, Result, StateError};
use crate::frame::{FrameOrchestrator, FrameState};
use crate::gpu::{
    BufferDesc, BufferHandle, BufferInfo, Format, GraphicsDevice, PipelineDesc, PipelineHandle,
    ShaderCompiler, ShaderHandle, ShaderSource, Submission, TextureDesc, TextureHandle,
    TextureInfo, TextureTarget,
};
use crate::resource::ResourceRegistry;
use crate::{rafx_debug, rafx_error, rafx_info, rafx_warn};

const SOURCE: &str = "rafx::context";

/// Render context configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Window title (used by backends that own a window, and in logs)
    pub title: String,
    /// Initial drawable width
    pub width: u32,
    /// Initial drawable height
    pub height: u32,
    /// Frames the CPU may record ahead of the GPU (1..=4)
    pub frames_in_flight: usize,
    /// Upper bound of the wait in `begin_frame`; exceeding it is `DeviceLost`
    pub frame_timeout: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            title: "rafx".to_string(),
            width: 1280,
            height: 720,
            frames_in_flight: 2,
            frame_timeout: Duration::from_secs(5),
        }
    }
}

pub struct RenderContext<D: GraphicsDevice> {
    device: D,
    compiler: Box<dyn ShaderCompiler>,
    registry: ResourceRegistry<D>,
    pipelines: PipelineCache<D>,
    frames: FrameOrchestrator,
    recorder: Option<CommandRecorder>,
    /// Swapchain-sized depth textures, one per requested format
    swapchain_depth: FxHashMap<Format, TextureHandle>,
    config: ContextConfig,
}

impl<D: GraphicsDevice> RenderContext<D> {
    /// Create a context over an initialized device
    ///
    /// # Errors
    ///
    /// `InvalidDescription` when `frames_in_flight` is outside 1..=4.
    pub fn new<C: ShaderCompiler + 'static>(mut device: D, compiler: C, config: ContextConfig) -> Result<Self> {
        if !(1..=4).contains(&config.frames_in_flight) {
            return Err(ResourceError::InvalidDescription(format!(
                "frames_in_flight must be within 1..=4, got {}",
                config.frames_in_flight
            ))
            .into());
        }
        device.configure_frames(config.frames_in_flight)?;
        let capabilities = device.capabilities().clone();
        rafx_info!(
            SOURCE,
            "Context '{}' created on {} ({:?}, {} frames in flight, {} bindless slots)",
            config.title,
            capabilities.name,
            capabilities.sync_model,
            config.frames_in_flight,
            capabilities.max_bindless_textures
        );
        Ok(Self {
            registry: ResourceRegistry::new(capabilities.max_bindless_textures),
            pipelines: PipelineCache::new(),
            frames: FrameOrchestrator::new(config.frames_in_flight, config.frame_timeout),
            recorder: None,
            swapchain_depth: FxHashMap::default(),
            compiler: Box::new(compiler),
            device,
            config,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // ===== RESOURCES =====

    pub fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferHandle> {
        self.registry.create_buffer(&mut self.device, desc, initial_data)
    }

    pub fn create_texture(&mut self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<TextureHandle> {
        self.registry.create_texture(&mut self.device, desc, initial_data)
    }

    /// Destroy a buffer once no in-flight frame uses it
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.registry.destroy_buffer(handle)
    }

    /// Destroy a texture once no in-flight frame uses it
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<()> {
        self.registry.destroy_texture(handle)
    }

    pub fn set_buffer_name(&mut self, handle: BufferHandle, name: &str) -> Result<()> {
        self.registry.set_buffer_name(&mut self.device, handle, name)
    }

    pub fn set_texture_name(&mut self, handle: TextureHandle, name: &str) -> Result<()> {
        self.registry.set_texture_name(&mut self.device, handle, name)
    }

    pub fn buffer_info(&self, handle: BufferHandle) -> Result<&BufferInfo> {
        self.registry.buffer_info(handle)
    }

    pub fn texture_info(&self, handle: TextureHandle) -> Result<&TextureInfo> {
        self.registry.texture_info(handle)
    }

    pub fn texture_format(&self, handle: TextureHandle) -> Result<Format> {
        self.registry.texture_format(handle)
    }

    pub fn texture_dimensions(&self, handle: TextureHandle) -> Result<(u32, u32, u32)> {
        self.registry.texture_dimensions(handle)
    }

    /// Bindless ID of a shader-readable texture
    pub fn texture_id(&self, handle: TextureHandle) -> Result<u32> {
        self.registry.texture_id(handle)
    }

    /// Write CPU-visible buffer memory
    pub fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.registry.write_buffer(&mut self.device, handle, offset, data)
    }

    pub fn registry(&self) -> &ResourceRegistry<D> {
        &self.registry
    }

    // ===== SHADERS & PIPELINES =====

    /// Compile a shader unit through the context's compiler
    pub fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle> {
        self.pipelines
            .compile_shader(&mut self.device, self.compiler.as_ref(), source)
    }

    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> Result<()> {
        self.pipelines.destroy_shader(&mut self.device, handle)
    }

    /// Create or fetch the cached pipeline for `desc`
    pub fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        self.pipelines.create_pipeline(&mut self.device, desc)
    }

    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> Result<()> {
        self.pipelines.destroy_pipeline(handle)
    }

    pub fn pipeline_cache_stats(&self) -> PipelineCacheStats {
        self.pipelines.stats()
    }

    pub fn pipeline_cache(&self) -> &PipelineCache<D> {
        &self.pipelines
    }

    // ===== FRAMES =====

    /// Start a frame
    ///
    /// Waits for the frame slot, releases resources whose last use
    /// completed, then acquires the next swapchain image.
    ///
    /// # Errors
    ///
    /// - `FrameAlreadyActive` when the previous frame was not ended
    /// - `DeviceLost` when the slot is still busy after `frame_timeout`
    /// - `SwapchainOutOfDate`: call [`Self::resize`] and retry
    pub fn begin_frame(&mut self) -> Result<()> {
        let completed = self.frames.wait_for_slot(&mut self.device)?;
        let released = self.registry.reconcile(&mut self.device, completed)
            + self.pipelines.reconcile(&mut self.device, completed);
        if released > 0 {
            rafx_debug!(SOURCE, "Reclaimed {} objects up to serial {}", released, completed);
        }

        let ticket = self.frames.acquire(&mut self.device)?;
        self.recorder = Some(CommandRecorder::new(
            ticket.serial,
            self.device.capabilities().sync_model,
        ));
        self.frames.mark_recording();
        Ok(())
    }

    /// Recording view of the active frame
    pub fn command_list(&mut self) -> Result<CommandList<'_, D>> {
        let recorder = self.recorder.as_mut().ok_or(StateError::NoActiveFrame)?;
        Ok(CommandList {
            recorder,
            device: &mut self.device,
            registry: &mut self.registry,
            pipelines: &mut self.pipelines,
            swapchain_depth: &mut self.swapchain_depth,
        })
    }

    /// Finish, submit and present the active frame
    ///
    /// An open pass or event scope fails with `PassStillActive` /
    /// `UnbalancedEvent`; the frame is still submitted and presented without
    /// its commands. `SwapchainOutOfDate` from present is returned after the
    /// frame was counted as submitted.
    pub fn end_frame(&mut self) -> Result<()> {
        let recorder = self.recorder.take().ok_or(StateError::NoActiveFrame)?;
        let ticket = self.frames.active().ok_or(StateError::NoActiveFrame)?;

        let (recording, recording_error) = match recorder.finish() {
            Ok(recording) => (recording, None),
            Err((error, fallback)) => {
                rafx_warn!(SOURCE, "Frame {} discarded: {}", ticket.serial, error);
                (fallback, Some(error))
            }
        };

        let submission = Submission {
            serial: recording.serial,
            frame_index: ticket.frame_index,
            image_index: ticket.image_index,
            wait_transfer: recording.wait_transfer,
            commands: &recording.commands,
            resources: &self.registry,
            pipelines: &self.pipelines,
        };
        if let Err(e) = self.device.submit(&submission) {
            rafx_error!(SOURCE, "Submit of frame {} failed: {}", ticket.serial, e);
            self.frames.abandon();
            return Err(e);
        }

        for (target, state) in recording.final_states {
            if let TextureTarget::Texture(handle) = target {
                self.registry.commit_texture_state(handle, state);
            }
        }
        let ticket = self.frames.mark_submitted()?;

        self.device.present(ticket.frame_index, ticket.image_index)?;
        self.frames.mark_presented(ticket);

        match recording_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Rebuild the swapchain for a new drawable size
    ///
    /// Waits for the device to go idle and retires the swapchain-sized depth
    /// textures; they are recreated on next use.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.frames.active().is_some() {
            return Err(StateError::FrameAlreadyActive.into());
        }
        self.device.wait_idle()?;
        self.device.resize(width, height)?;
        for (_, handle) in self.swapchain_depth.drain() {
            self.registry.destroy_texture(handle)?;
        }
        let completed = self.device.completed_serial()?;
        self.registry.reconcile(&mut self.device, completed);
        self.pipelines.reconcile(&mut self.device, completed);
        self.config.width = width;
        self.config.height = height;
        rafx_info!(SOURCE, "Resized to {}x{}", width, height);
        Ok(())
    }

    /// Block until every submitted frame completed
    pub fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    // ===== QUERIES =====

    /// Seconds between the two last `begin_frame` calls
    pub fn delta_time(&self) -> f32 {
        self.frames.delta_time()
    }

    /// Serial of the active frame, or of the next one between frames
    pub fn frame_serial(&self) -> u64 {
        self.frames
            .active()
            .map(|t| t.serial)
            .unwrap_or_else(|| self.frames.next_serial())
    }

    /// Frame slot of the active frame, if any
    pub fn frame_index(&self) -> Option<usize> {
        self.frames.active().map(|t| t.frame_index)
    }

    pub fn frame_state(&self) -> FrameState {
        self.frames.current_state()
    }

    pub fn frames(&self) -> &FrameOrchestrator {
        &self.frames
    }

    pub fn swapchain_format(&self) -> Format {
        self.device.swapchain().format
    }

    pub fn swapchain_extent(&self) -> (u32, u32) {
        let swapchain = self.device.swapchain();
        (swapchain.width, swapchain.height)
    }

    /// Native device
    pub fn backend(&self) -> &D {
        &self.device
    }

    /// Native device, mutably (simulation controls, backend extras)
    pub fn backend_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GraphicsDevice> Drop for RenderContext<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            rafx_error!(SOURCE, "wait_idle failed during teardown: {}", e);
        }
        self.swapchain_depth.clear();
        self.registry.release_all(&mut self.device);
        self.pipelines.release_all(&mut self.device);
        rafx_info!(SOURCE, "Context '{}' destroyed", self.config.title);
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
