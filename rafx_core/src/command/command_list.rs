/// CommandList - the per-frame recording API
///
/// Obtained from `RenderContext::command_list()` between `begin_frame` and
/// `end_frame`. Every method validates its preconditions against the
/// registry, the pipeline cache and the recorder state, then appends one
/// command. Misuse is reported immediately and nothing is appended.

use rustc_hash::FxHashMap;

use crate::command::recorder::{ActivePass, BoundPipeline, CommandRecorder};
use crate::compiler::PipelineCache;
use crate::error::{ResourceError, Result, StateError};
use crate::gpu::{
    BufferHandle, BufferUsage, ClearColor, Command, Format, GraphicsDevice, IndexType,
    PipelineHandle, Rect2D, RenderTargetFormats, ResourceState, TextureDesc, TextureHandle,
    TextureTarget, TextureUsage, Viewport,
};
use crate::resource::ResourceRegistry;
use crate::rafx_trace;

const SOURCE: &str = "rafx::command_list";

/// Recording view over one frame
pub struct CommandList<'a, D: GraphicsDevice> {
    pub(crate) recorder: &'a mut CommandRecorder,
    pub(crate) device: &'a mut D,
    pub(crate) registry: &'a mut ResourceRegistry<D>,
    pub(crate) pipelines: &'a mut PipelineCache<D>,
    pub(crate) swapchain_depth: &'a mut FxHashMap<Format, TextureHandle>,
}

impl<'a, D: GraphicsDevice> CommandList<'a, D> {
    fn serial(&self) -> u64 {
        self.recorder.serial()
    }

    // ===== DEBUG SCOPES =====

    /// Open a labeled debug scope
    pub fn begin_event(&mut self, label: &str) {
        self.recorder.begin_event();
        self.recorder.push(Command::BeginEvent(label.to_string()));
    }

    /// Close the innermost debug scope
    pub fn end_event(&mut self) -> Result<()> {
        self.recorder.end_event()?;
        self.recorder.push(Command::EndEvent);
        Ok(())
    }

    // ===== STATE TRANSITIONS =====

    /// Move a texture to `state`
    ///
    /// No-op when the texture already is in `state`.
    ///
    /// # Errors
    ///
    /// - `TransitionInsidePass` inside an open render pass
    /// - `IncompatibleUsage` when the usage flags or aspect forbid `state`
    /// - `InvalidHandle` for a destroyed texture
    pub fn transition(&mut self, texture: TextureHandle, state: ResourceState) -> Result<()> {
        if self.recorder.pass.is_some() {
            return Err(StateError::TransitionInsidePass.into());
        }
        let serial = self.serial();
        let (info, ticket) = self.registry.use_texture(texture, serial)?;
        if let Some(required) = state.required_usage() {
            if !info.usage.contains(required) {
                return Err(StateError::IncompatibleUsage("this resource state").into());
            }
        }
        let aspect = info.aspect();
        if !state.allows_aspect(aspect) {
            return Err(StateError::IncompatibleUsage("this resource state").into());
        }
        let committed = info.state;
        self.recorder.note_upload(ticket);
        if let Some(cmd) = self
            .recorder
            .tracker
            .transition(TextureTarget::Texture(texture), committed, state, aspect)
        {
            self.recorder.push(cmd);
        }
        Ok(())
    }

    // ===== RENDER PASSES =====

    /// Begin a render pass on registry textures
    ///
    /// Color targets must be in `ColorAttachment` and the depth target in
    /// `DepthWrite`. A pass with no color target and one depth target is valid.
    ///
    /// # Errors
    ///
    /// - `InvalidResourceState` when a target is not in its renderable state
    /// - `PassAlreadyActive`, `EmptyRenderPass`, `AttachmentSizeMismatch`
    pub fn begin_render_pass(
        &mut self,
        colors: &[TextureHandle],
        depth: Option<TextureHandle>,
        clear_color: ClearColor,
        clear_depth: f32,
    ) -> Result<()> {
        if self.recorder.pass.is_some() {
            return Err(StateError::PassAlreadyActive.into());
        }
        if colors.is_empty() && depth.is_none() {
            return Err(StateError::EmptyRenderPass.into());
        }

        let serial = self.serial();
        let mut formats = RenderTargetFormats::default();
        let mut extent: Option<(u32, u32)> = None;
        let mut check_extent = |w: u32, h: u32| -> Result<()> {
            match extent {
                Some(e) if e != (w, h) => Err(StateError::AttachmentSizeMismatch.into()),
                _ => {
                    extent = Some((w, h));
                    Ok(())
                }
            }
        };

        for &color in colors {
            let (info, _) = self.registry.use_texture(color, serial)?;
            if !info.usage.contains(TextureUsage::COLOR_TARGET) {
                return Err(StateError::IncompatibleUsage("color attachment").into());
            }
            let actual = self.recorder.tracker.state(TextureTarget::Texture(color), info.state);
            if actual != ResourceState::ColorAttachment {
                return Err(StateError::InvalidResourceState {
                    expected: ResourceState::ColorAttachment,
                    actual,
                }
                .into());
            }
            formats.colors.push(info.format);
            check_extent(info.width, info.height)?;
        }

        if let Some(depth) = depth {
            let (info, _) = self.registry.use_texture(depth, serial)?;
            if !info.usage.contains(TextureUsage::DEPTH_STENCIL) {
                return Err(StateError::IncompatibleUsage("depth attachment").into());
            }
            let actual = self.recorder.tracker.state(TextureTarget::Texture(depth), info.state);
            if actual != ResourceState::DepthWrite {
                return Err(StateError::InvalidResourceState {
                    expected: ResourceState::DepthWrite,
                    actual,
                }
                .into());
            }
            formats.depth = Some(info.format);
            check_extent(info.width, info.height)?;
        }

        let (width, height) = extent.unwrap_or((0, 0));
        rafx_trace!(SOURCE, "begin_render_pass {}x{} {:?}", width, height, formats);
        self.recorder.push(Command::BeginRenderPass {
            colors: colors.iter().map(|&c| TextureTarget::Texture(c)).collect(),
            depth: depth.map(TextureTarget::Texture),
            clear_color,
            clear_depth,
            width,
            height,
        });
        self.recorder.open_pass(ActivePass { formats });
        Ok(())
    }

    /// Begin a render pass on the current swapchain image
    ///
    /// The swapchain image is transitioned to `ColorAttachment`. With a depth
    /// format, a swapchain-sized depth texture owned by the context is used
    /// and transitioned to `DepthWrite`.
    pub fn begin_swapchain_render_pass(
        &mut self,
        clear_color: ClearColor,
        depth_format: Option<Format>,
        clear_depth: f32,
    ) -> Result<()> {
        if self.recorder.pass.is_some() {
            return Err(StateError::PassAlreadyActive.into());
        }
        let swapchain = self.device.swapchain();
        let depth = match depth_format {
            Some(format) => Some(self.swapchain_depth_texture(format)?),
            None => None,
        };

        if let Some(cmd) = self.recorder.tracker.transition(
            TextureTarget::Swapchain,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
            swapchain.format.aspect(),
        ) {
            self.recorder.push(cmd);
        }
        if let Some(depth) = depth {
            self.transition(depth, ResourceState::DepthWrite)?;
        }

        rafx_trace!(SOURCE, "begin_swapchain_render_pass {}x{}", swapchain.width, swapchain.height);
        self.recorder.push(Command::BeginRenderPass {
            colors: vec![TextureTarget::Swapchain],
            depth: depth.map(TextureTarget::Texture),
            clear_color,
            clear_depth,
            width: swapchain.width,
            height: swapchain.height,
        });
        self.recorder.open_pass(ActivePass {
            formats: RenderTargetFormats {
                colors: vec![swapchain.format],
                depth: depth_format,
            },
        });
        Ok(())
    }

    /// Swapchain-sized depth texture for `format`, created on first use
    fn swapchain_depth_texture(&mut self, format: Format) -> Result<TextureHandle> {
        if !format.is_depth() {
            return Err(ResourceError::UnsupportedFormat(format).into());
        }
        if let Some(&handle) = self.swapchain_depth.get(&format) {
            return Ok(handle);
        }
        let swapchain = self.device.swapchain();
        let desc = TextureDesc::new_2d(swapchain.width, swapchain.height, format, TextureUsage::DEPTH_STENCIL)
            .with_name("SwapchainDepth");
        let handle = self.registry.create_texture(self.device, &desc, None)?;
        self.swapchain_depth.insert(format, handle);
        Ok(handle)
    }

    /// End the open render pass
    pub fn end_render_pass(&mut self) -> Result<()> {
        self.recorder.close_pass()?;
        self.recorder.push(Command::EndRenderPass);
        Ok(())
    }

    // ===== BINDINGS =====

    /// Bind a pipeline
    ///
    /// # Errors
    ///
    /// - `NoActivePass` outside a render pass
    /// - `PipelineRenderTargetMismatch` when the pipeline targets other formats
    pub fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let pass_formats = match &self.recorder.pass {
            Some(pass) => pass.formats.clone(),
            None => return Err(StateError::NoActivePass.into()),
        };
        let serial = self.serial();
        let info = self.pipelines.use_pipeline(pipeline, serial)?;
        if info.targets != pass_formats {
            return Err(StateError::PipelineRenderTargetMismatch.into());
        }
        self.recorder.pipeline = Some(BoundPipeline {
            handle: pipeline,
            info: info.clone(),
        });
        self.recorder.push(Command::BindPipeline(pipeline));
        Ok(())
    }

    /// Bind the vertex buffer (slot 0)
    pub fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()> {
        self.check_buffer(buffer, offset, BufferUsage::VERTEX, "vertex buffer binding")?;
        self.recorder.vertex_buffer_bound = true;
        self.recorder.push(Command::BindVertexBuffer { buffer, offset });
        Ok(())
    }

    /// Bind the index buffer
    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        self.check_buffer(buffer, offset, BufferUsage::INDEX, "index buffer binding")?;
        self.recorder.index_buffer = Some(index_type);
        self.recorder.push(Command::BindIndexBuffer { buffer, offset, index_type });
        Ok(())
    }

    fn check_buffer(&mut self, buffer: BufferHandle, offset: u64, usage: BufferUsage, what: &'static str) -> Result<()> {
        if self.recorder.pass.is_none() {
            return Err(StateError::NoActivePass.into());
        }
        let serial = self.serial();
        let (info, ticket) = self.registry.use_buffer(buffer, serial)?;
        if !info.usage.contains(usage) {
            return Err(StateError::IncompatibleUsage(what).into());
        }
        if offset >= info.size {
            return Err(ResourceError::InvalidDescription(format!(
                "binding offset {} outside buffer of {} bytes",
                offset, info.size
            ))
            .into());
        }
        self.recorder.note_upload(ticket);
        Ok(())
    }

    // ===== DYNAMIC STATE =====

    /// Set a single viewport
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.set_viewports(&[viewport])
    }

    /// Set several viewports
    ///
    /// More than one requires a bound pipeline that declares multi-viewport support.
    pub fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()> {
        if viewports.is_empty() {
            return Err(ResourceError::InvalidDescription("no viewport given".to_string()).into());
        }
        if viewports.len() > 1 {
            let allowed = self
                .recorder
                .pipeline
                .as_ref()
                .map(|p| p.info.multi_viewport)
                .unwrap_or(false)
                && viewports.len() as u32 <= self.device.capabilities().max_viewports;
            if !allowed {
                return Err(StateError::MultiViewportUnsupported.into());
            }
        }
        self.recorder.push(Command::SetViewports(viewports.to_vec()));
        Ok(())
    }

    /// Set the scissor rectangle
    pub fn set_scissor(&mut self, rect: Rect2D) {
        self.recorder.push(Command::SetScissor(rect));
    }

    /// Deliver raw push-constant bytes, verbatim, at offset 0
    ///
    /// # Errors
    ///
    /// - `NoPipelineBound` without a bound pipeline
    /// - `PushConstantsTooLarge` above the device budget
    /// - `PushConstantSizeMismatch` above the shader's declared block size
    pub fn push_constants(&mut self, data: &[u8]) -> Result<()> {
        let pipeline = self.recorder.pipeline.as_ref().ok_or(StateError::NoPipelineBound)?;
        let size = data.len() as u32;
        let max = self.device.capabilities().max_push_constant_size;
        if size > max {
            return Err(StateError::PushConstantsTooLarge { size, max }.into());
        }
        let declared = pipeline.info.push_constant_size;
        if declared > 0 && size > declared {
            return Err(StateError::PushConstantSizeMismatch { size, declared }.into());
        }
        self.recorder.push(Command::PushConstants(data.to_vec()));
        Ok(())
    }

    /// Deliver a plain-old-data struct as push constants
    pub fn push_constants_pod<T: bytemuck::Pod>(&mut self, value: &T) -> Result<()> {
        self.push_constants(bytemuck::bytes_of(value))
    }

    // ===== DRAWS =====

    fn check_draw(&self, indexed: bool) -> Result<()> {
        if self.recorder.pass.is_none() {
            return Err(StateError::NoActivePass.into());
        }
        let pipeline = self.recorder.pipeline.as_ref().ok_or(StateError::NoPipelineBound)?;
        if indexed && self.recorder.index_buffer.is_none() {
            return Err(StateError::NoIndexBufferBound.into());
        }
        if pipeline.info.consumes_vertices && !self.recorder.vertex_buffer_bound {
            return Err(StateError::NoVertexBufferBound.into());
        }
        Ok(())
    }

    /// Non-indexed draw
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.check_draw(false)?;
        self.recorder.push(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        });
        Ok(())
    }

    /// Indexed draw from the start of the bound index buffer
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<()> {
        self.draw_indexed_offset(index_count, instance_count, 0, 0, 0)
    }

    /// Indexed draw with explicit offsets
    pub fn draw_indexed_offset(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_draw(true)?;
        self.recorder.push(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    // ===== QUERIES =====

    /// Bindless ID of a shader-readable texture
    pub fn texture_id(&self, texture: TextureHandle) -> Result<u32> {
        self.registry.texture_id(texture)
    }

    /// Current swapchain size
    pub fn swapchain_extent(&self) -> (u32, u32) {
        let swapchain = self.device.swapchain();
        (swapchain.width, swapchain.height)
    }

    /// Pipeline bound since the pass began
    pub fn bound_pipeline(&self) -> Option<PipelineHandle> {
        self.recorder.pipeline.as_ref().map(|p| p.handle)
    }

    /// Commands recorded so far in this frame
    pub fn commands(&self) -> &[Command] {
        self.recorder.commands()
    }
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
