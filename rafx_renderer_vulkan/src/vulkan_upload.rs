/// Upload queue - copies initial resource contents through staging buffers
///
/// Each upload is its own one-shot command buffer that signals the next value
/// of a transfer timeline semaphore. That value is the upload ticket handed
/// back to the registry; frames using the resource wait for it.

use ash::vk;
use rafx_core::rafx::{ResourceState, Result, TextureAspect};
use rafx_core::{rafx_err, rafx_trace};
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{init_error, vk_error, GpuContext, SOURCE};
use crate::vulkan_format::image_barrier;
use crate::vulkan_texture::VulkanTexture;

struct PendingUpload {
    ticket: u64,
    command_buffer: vk::CommandBuffer,
    /// Kept alive until the copy completed
    _staging: VulkanBuffer,
}

pub(crate) struct UploadQueue {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    timeline: vk::Semaphore,
    last_ticket: u64,
    in_flight: Vec<PendingUpload>,
}

impl UploadQueue {
    pub(crate) fn new(ctx: &Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| init_error("Failed to create upload command pool", e))?;

            let timeline = match create_timeline_semaphore(&ctx.device) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(init_error("Failed to create upload timeline", e));
                }
            };

            Ok(Self {
                ctx: Arc::clone(ctx),
                command_pool,
                timeline,
                last_ticket: 0,
                in_flight: Vec::new(),
            })
        }
    }

    /// Timeline semaphore signaled by uploads
    pub(crate) fn timeline(&self) -> vk::Semaphore {
        self.timeline
    }

    /// Copy `data` into the start of a device-local buffer
    pub(crate) fn upload_buffer(&mut self, dst: &VulkanBuffer, data: &[u8]) -> Result<u64> {
        let staging = self.stage(data)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: data.len() as u64,
        };
        let src = staging.buffer;
        self.submit(staging, |device, cmd| unsafe {
            device.cmd_copy_buffer(cmd, src, dst.buffer, &[region]);
        })
    }

    /// Copy `data` into a color texture and leave it in `ShaderRead`
    pub(crate) fn upload_texture(&mut self, dst: &VulkanTexture, data: &[u8]) -> Result<u64> {
        let staging = self.stage(data)?;
        let src = staging.buffer;
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(dst.extent);
        let to_copy = [image_barrier(dst.image, TextureAspect::Color, ResourceState::Undefined, ResourceState::CopyDst)];
        let to_read = [image_barrier(dst.image, TextureAspect::Color, ResourceState::CopyDst, ResourceState::ShaderRead)];

        self.submit(staging, |device, cmd| unsafe {
            device.cmd_pipeline_barrier2(cmd, &vk::DependencyInfo::default().image_memory_barriers(&to_copy));
            device.cmd_copy_buffer_to_image(cmd, src, dst.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
            device.cmd_pipeline_barrier2(cmd, &vk::DependencyInfo::default().image_memory_barriers(&to_read));
        })
    }

    fn stage(&self, data: &[u8]) -> Result<VulkanBuffer> {
        let staging = VulkanBuffer::staging(&self.ctx, data.len() as u64)?;
        staging.write(0, data)?;
        Ok(staging)
    }

    fn submit(
        &mut self,
        staging: VulkanBuffer,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<u64> {
        let device = &self.ctx.device;
        let ticket = self.last_ticket + 1;
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| vk_error("allocate upload command buffer", e))?
                .into_iter()
                .next()
                .ok_or_else(|| rafx_err!(SOURCE, "Driver returned no upload command buffer"))?;

            let recorded = (|| -> std::result::Result<(), vk::Result> {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                device.begin_command_buffer(command_buffer, &begin_info)?;
                record(device, command_buffer);
                device.end_command_buffer(command_buffer)?;

                let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(command_buffer)];
                let signals = [vk::SemaphoreSubmitInfo::default()
                    .semaphore(self.timeline)
                    .value(ticket)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
                let submit = vk::SubmitInfo2::default()
                    .command_buffer_infos(&command_buffers)
                    .signal_semaphore_infos(&signals);
                device.queue_submit2(self.ctx.graphics_queue, &[submit], vk::Fence::null())
            })();

            if let Err(e) = recorded {
                device.free_command_buffers(self.command_pool, &[command_buffer]);
                return Err(vk_error("submit upload", e));
            }

            self.last_ticket = ticket;
            self.in_flight.push(PendingUpload {
                ticket,
                command_buffer,
                _staging: staging,
            });
        }
        rafx_trace!(SOURCE, "Upload ticket {} submitted", ticket);
        Ok(ticket)
    }

    /// Release staging memory of completed uploads
    pub(crate) fn reclaim(&mut self) -> Result<()> {
        if self.in_flight.is_empty() {
            return Ok(());
        }
        let completed = unsafe {
            self.ctx
                .device
                .get_semaphore_counter_value(self.timeline)
                .map_err(|e| vk_error("query upload timeline", e))?
        };
        let (done, pending): (Vec<_>, Vec<_>) = self
            .in_flight
            .drain(..)
            .partition(|upload| upload.ticket <= completed);
        self.in_flight = pending;
        if !done.is_empty() {
            let command_buffers: Vec<vk::CommandBuffer> = done.iter().map(|u| u.command_buffer).collect();
            unsafe {
                self.ctx.device.free_command_buffers(self.command_pool, &command_buffers);
            }
            rafx_trace!(SOURCE, "Reclaimed {} uploads up to ticket {}", done.len(), completed);
        }
        Ok(())
    }

    /// Destroy everything. The device must be idle.
    pub(crate) fn destroy(&mut self) {
        self.in_flight.clear();
        unsafe {
            if self.command_pool != vk::CommandPool::null() {
                self.ctx.device.destroy_command_pool(self.command_pool, None);
            }
            if self.timeline != vk::Semaphore::null() {
                self.ctx.device.destroy_semaphore(self.timeline, None);
            }
        }
        self.command_pool = vk::CommandPool::null();
        self.timeline = vk::Semaphore::null();
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn create_timeline_semaphore(device: &ash::Device) -> std::result::Result<vk::Semaphore, vk::Result> {
    let mut type_info = vk::SemaphoreTypeCreateInfo::default()
        .semaphore_type(vk::SemaphoreType::TIMELINE)
        .initial_value(0);
    let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
    unsafe { device.create_semaphore(&info, None) }
}
