/// VulkanBuffer - native buffer owned by the resource registry

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use rafx_core::rafx::{BufferDesc, MemoryLocation, ResourceError, Result};
use rafx_core::rafx_err;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer
///
/// Frees its memory on drop, so the device's `destroy_buffer` is a plain drop.
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size
    pub(crate) size: u64,
}

pub(crate) fn memory_location_to_allocator(memory: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match memory {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

impl VulkanBuffer {
    /// Create and bind a buffer
    ///
    /// `extra_usage` is or-ed into the described usage (TRANSFER_DST for
    /// device-local buffers with initial contents).
    pub(crate) fn new(
        ctx: &Arc<GpuContext>,
        desc: &BufferDesc,
        extra_usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let name = desc.debug_name.as_deref().unwrap_or("buffer");
        Self::with_location(
            ctx,
            name,
            desc.size,
            buffer_usage_to_vk(desc.usage) | extra_usage,
            memory_location_to_allocator(desc.memory),
        )
    }

    /// Host-visible TRANSFER_SRC buffer used to stage an upload
    pub(crate) fn staging(ctx: &Arc<GpuContext>, size: u64) -> Result<Self> {
        Self::with_location(
            ctx,
            "staging",
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            gpu_allocator::MemoryLocation::CpuToGpu,
        )
    }

    fn with_location(
        ctx: &Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: gpu_allocator::MemoryLocation,
    ) -> Result<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| rafx_err!(SOURCE, "Failed to create buffer '{}' of {} bytes: {:?}", name, size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate(name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // Wrap first so an error below still releases both
            let vulkan_buffer = Self {
                ctx: Arc::clone(ctx),
                buffer,
                allocation: Some(allocation),
                size,
            };
            if let Some(allocation) = &vulkan_buffer.allocation {
                ctx.device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map_err(|e| rafx_err!(SOURCE, "Failed to bind memory of buffer '{}': {:?}", name, e))?;
            }
            Ok(vulkan_buffer)
        }
    }

    /// Copy `data` into mapped memory at `offset`
    pub(crate) fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let in_range = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= self.size);
        if !in_range {
            return Err(ResourceError::InvalidDescription(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            ))
            .into());
        }
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| rafx_err!(SOURCE, "Buffer write failed: no GPU allocation"))?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| rafx_err!(SOURCE, "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
