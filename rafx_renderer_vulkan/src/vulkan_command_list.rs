/// Frame command buffers and the replay of recorded commands
///
/// The core hands the device a validated, linear command stream. Replay maps
/// each command onto the frame slot's command buffer; handles are resolved
/// through the submission's resolvers.

use ash::vk;
use rafx_core::rafx::{
    Command, DeviceError, Error, PipelineStages, ResourceState, Result, Submission, TextureAspect,
    TextureTarget, Viewport,
};
use rafx_core::{rafx_bail, rafx_err, rafx_error, rafx_trace};
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_bindless::BindlessTable;
use crate::vulkan_context::{vk_error, GpuContext, SOURCE};
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::{flipped_viewport, image_barrier, index_type_to_vk, stages_to_vk};
use crate::vulkan_pipeline::PUSH_CONSTANT_STAGES;
use crate::vulkan_swapchain::VulkanSwapchain;

/// Command pool, command buffer and acquire semaphore of one frame slot
pub(crate) struct FrameCommands {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Signaled by the swapchain when the acquired image is ready
    pub(crate) image_acquired: vk::Semaphore,
}

impl FrameCommands {
    pub(crate) fn new(ctx: &Arc<GpuContext>) -> Result<Self> {
        let device = &ctx.device;
        let mut frame = Self {
            ctx: Arc::clone(ctx),
            pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            image_acquired: vk::Semaphore::null(),
        };
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            frame.pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_error("create frame command pool", e))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(frame.pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            frame.command_buffer = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| vk_error("allocate frame command buffer", e))?
                .into_iter()
                .next()
                .ok_or_else(|| rafx_err!(SOURCE, "Driver returned no frame command buffer"))?;

            frame.image_acquired = device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| vk_error("create image-acquired semaphore", e))?;
        }
        Ok(frame)
    }

    /// Reset the pool and begin a one-time command buffer
    ///
    /// The slot's previous submission must have completed.
    pub(crate) fn begin(&self) -> Result<vk::CommandBuffer> {
        let device = &self.ctx.device;
        unsafe {
            device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| vk_error("reset frame command pool", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error("begin frame command buffer", e))?;
        }
        Ok(self.command_buffer)
    }
}

impl Drop for FrameCommands {
    fn drop(&mut self) {
        unsafe {
            if self.image_acquired != vk::Semaphore::null() {
                self.ctx.device.destroy_semaphore(self.image_acquired, None);
            }
            if self.pool != vk::CommandPool::null() {
                // Frees the command buffer as well
                self.ctx.device.destroy_command_pool(self.pool, None);
            }
        }
    }
}

/// Replays one submission into a command buffer
pub(crate) struct CommandReplay<'a> {
    pub(crate) device: &'a ash::Device,
    pub(crate) debug_utils: Option<&'a ash::ext::debug_utils::Device>,
    pub(crate) cmd: vk::CommandBuffer,
    pub(crate) submission: &'a Submission<'a, VulkanDevice>,
    pub(crate) swapchain: &'a VulkanSwapchain,
    pub(crate) bindless: &'a BindlessTable,
    /// Layout of the bound pipeline (push constants)
    /// Layout and push-constant range size of the bound pipeline
    bound_layout: Option<(vk::PipelineLayout, u32)>,
    viewport_count: u32,
    scissor: Option<vk::Rect2D>,
    swapchain_state: ResourceState,
}

impl<'a> CommandReplay<'a> {
    pub(crate) fn new(
        device: &'a ash::Device,
        debug_utils: Option<&'a ash::ext::debug_utils::Device>,
        cmd: vk::CommandBuffer,
        submission: &'a Submission<'a, VulkanDevice>,
        swapchain: &'a VulkanSwapchain,
        bindless: &'a BindlessTable,
    ) -> Self {
        Self {
            device,
            debug_utils,
            cmd,
            submission,
            swapchain,
            bindless,
            bound_layout: None,
            viewport_count: 1,
            scissor: None,
            swapchain_state: ResourceState::Undefined,
        }
    }

    /// Record every command, then leave the swapchain image presentable
    pub(crate) fn record(mut self) -> Result<()> {
        for command in self.submission.commands {
            self.replay(command)?;
        }
        if self.swapchain_state != ResourceState::Present {
            rafx_trace!(SOURCE, "Frame {} left the swapchain image in {:?}", self.submission.serial, self.swapchain_state);
            self.barrier(TextureTarget::Swapchain, self.swapchain_state, ResourceState::Present, TextureAspect::Color)?;
        }
        Ok(())
    }

    fn missing(&self, what: String) -> Error {
        rafx_error!(SOURCE, "Submission {} references {}", self.submission.serial, what);
        DeviceError::DeviceLost(format!("submission references {}", what)).into()
    }

    /// Image, render view and aspect behind a target
    fn resolve_target(&self, target: TextureTarget) -> Result<(vk::Image, vk::ImageView, TextureAspect)> {
        match target {
            TextureTarget::Swapchain => self
                .swapchain
                .target(self.submission.image_index)
                .map(|(image, view)| (image, view, TextureAspect::Color))
                .ok_or_else(|| self.missing(format!("swapchain image {}", self.submission.image_index))),
            TextureTarget::Texture(handle) => self
                .submission
                .resources
                .resolve_texture(handle)
                .map(|texture| (texture.image, texture.render_view(), texture.aspect))
                .ok_or_else(|| self.missing(format!("released texture {:?}", handle))),
        }
    }

    fn barrier(
        &mut self,
        target: TextureTarget,
        from: ResourceState,
        to: ResourceState,
        aspect: TextureAspect,
    ) -> Result<()> {
        let (image, _, _) = self.resolve_target(target)?;
        let mut barrier = image_barrier(image, aspect, from, to);
        if target == TextureTarget::Swapchain {
            if from == ResourceState::Undefined {
                // Chain with the acquire semaphore wait
                barrier = barrier.src_stage_mask(stages_to_vk(PipelineStages::COLOR_ATTACHMENT_OUTPUT));
            }
            self.swapchain_state = to;
        }
        let barriers = [barrier];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.cmd, &dependency);
        }
        Ok(())
    }

    fn set_scissors(&self) {
        if let Some(scissor) = self.scissor {
            let scissors = vec![scissor; self.viewport_count as usize];
            unsafe {
                self.device.cmd_set_scissor_with_count(self.cmd, &scissors);
            }
        }
    }

    fn replay(&mut self, command: &Command) -> Result<()> {
        let device = self.device;
        let cmd = self.cmd;
        match command {
            Command::BeginEvent(name) => {
                if let Some(debug_utils) = self.debug_utils {
                    let label = CString::new(name.as_str()).unwrap_or_default();
                    let info = vk::DebugUtilsLabelEXT::default().label_name(&label);
                    unsafe { debug_utils.cmd_begin_debug_utils_label(cmd, &info) };
                }
            }
            Command::EndEvent => {
                if let Some(debug_utils) = self.debug_utils {
                    unsafe { debug_utils.cmd_end_debug_utils_label(cmd) };
                }
            }
            Command::Barrier(barrier) => {
                self.barrier(barrier.target, barrier.from, barrier.to, barrier.aspect)?;
            }
            Command::DeclareUsage { target, state, .. } => {
                // Only emitted for implicit-tracking devices
                rafx_trace!(SOURCE, "Ignoring usage declaration {:?} -> {:?}", target, state);
            }
            Command::BeginRenderPass {
                colors,
                depth,
                clear_color,
                clear_depth,
                width,
                height,
            } => {
                let mut color_attachments = Vec::with_capacity(colors.len());
                for target in colors {
                    let (_, view, _) = self.resolve_target(*target)?;
                    color_attachments.push(
                        vk::RenderingAttachmentInfo::default()
                            .image_view(view)
                            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                            .load_op(vk::AttachmentLoadOp::CLEAR)
                            .store_op(vk::AttachmentStoreOp::STORE)
                            .clear_value(vk::ClearValue {
                                color: vk::ClearColorValue { float32: clear_color.0 },
                            }),
                    );
                }
                let depth_target = depth.map(|target| self.resolve_target(target)).transpose()?;
                let depth_attachment = depth_target.map(|(_, view, _)| {
                    vk::RenderingAttachmentInfo::default()
                        .image_view(view)
                        .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                        .load_op(vk::AttachmentLoadOp::CLEAR)
                        .store_op(vk::AttachmentStoreOp::STORE)
                        .clear_value(vk::ClearValue {
                            depth_stencil: vk::ClearDepthStencilValue {
                                depth: *clear_depth,
                                stencil: 0,
                            },
                        })
                });

                let area = vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D { width: *width, height: *height },
                };
                let mut rendering = vk::RenderingInfo::default()
                    .render_area(area)
                    .layer_count(1)
                    .color_attachments(&color_attachments);
                if let Some(attachment) = &depth_attachment {
                    rendering = rendering.depth_attachment(attachment);
                    if depth_target.map(|(_, _, aspect)| aspect) == Some(TextureAspect::DepthStencil) {
                        rendering = rendering.stencil_attachment(attachment);
                    }
                }

                // Full-target viewport and scissor until the caller sets its own
                let viewport = Viewport::from_size(*width, *height);
                self.viewport_count = 1;
                self.scissor = Some(area);
                unsafe {
                    device.cmd_begin_rendering(cmd, &rendering);
                    device.cmd_set_viewport_with_count(cmd, &[flipped_viewport(&viewport)]);
                }
                self.set_scissors();
            }
            Command::EndRenderPass => unsafe {
                device.cmd_end_rendering(cmd);
            },
            Command::BindPipeline(handle) => {
                let pipeline = self
                    .submission
                    .pipelines
                    .resolve_pipeline(*handle)
                    .ok_or_else(|| self.missing(format!("released pipeline {:?}", handle)))?;
                unsafe {
                    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
                    device.cmd_bind_descriptor_sets(
                        cmd,
                        vk::PipelineBindPoint::GRAPHICS,
                        pipeline.layout,
                        0,
                        &[self.bindless.set],
                        &[],
                    );
                }
                self.bound_layout = Some((pipeline.layout, pipeline.push_constant_size));
            }
            Command::BindVertexBuffer { buffer, offset } => {
                let native = self
                    .submission
                    .resources
                    .resolve_buffer(*buffer)
                    .ok_or_else(|| self.missing(format!("released buffer {:?}", buffer)))?;
                unsafe {
                    device.cmd_bind_vertex_buffers(cmd, 0, &[native.buffer], &[*offset]);
                }
            }
            Command::BindIndexBuffer { buffer, offset, index_type } => {
                let native = self
                    .submission
                    .resources
                    .resolve_buffer(*buffer)
                    .ok_or_else(|| self.missing(format!("released buffer {:?}", buffer)))?;
                unsafe {
                    device.cmd_bind_index_buffer(cmd, native.buffer, *offset, index_type_to_vk(*index_type));
                }
            }
            Command::SetViewports(viewports) => {
                let flipped: Vec<vk::Viewport> = viewports.iter().map(flipped_viewport).collect();
                self.viewport_count = flipped.len() as u32;
                unsafe {
                    device.cmd_set_viewport_with_count(cmd, &flipped);
                }
                // Scissor count must track the viewport count
                self.set_scissors();
            }
            Command::SetScissor(rect) => {
                self.scissor = Some(vk::Rect2D {
                    offset: vk::Offset2D { x: rect.x, y: rect.y },
                    extent: vk::Extent2D { width: rect.width, height: rect.height },
                });
                self.set_scissors();
            }
            Command::PushConstants(data) => {
                let (layout, range) = self
                    .bound_layout
                    .ok_or_else(|| rafx_err!(SOURCE, "Push constants recorded before any pipeline"))?;
                if data.len() as u64 > range as u64 {
                    rafx_bail!(
                        SOURCE,
                        "{} bytes of push constants exceed the pipeline range of {}",
                        data.len(),
                        range
                    );
                }
                unsafe {
                    device.cmd_push_constants(cmd, layout, PUSH_CONSTANT_STAGES, 0, data);
                }
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => unsafe {
                device.cmd_draw(cmd, *vertex_count, *instance_count, *first_vertex, *first_instance);
            },
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => unsafe {
                device.cmd_draw_indexed(
                    cmd,
                    *index_count,
                    *instance_count,
                    *first_index,
                    *vertex_offset,
                    *first_instance,
                );
            },
        }
        Ok(())
    }
}
