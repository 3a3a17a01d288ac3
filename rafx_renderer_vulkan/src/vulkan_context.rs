/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything a native resource needs to release itself:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics queue used for frame and upload submissions

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use rafx_core::rafx::{DeviceError, Error, ResourceError, Result};
use rafx_core::{rafx_err, rafx_error};
use std::mem::ManuallyDrop;
use std::sync::Mutex;

pub(crate) const SOURCE: &str = "rafx::vulkan";

/// Shared GPU context for all Vulkan resources.
///
/// Shared through `Arc` by buffers, textures, shader modules and pipelines
/// so each can free itself on drop.
///
/// Device and instance destruction is handled by `VulkanDevice::drop`,
/// which first drops the allocator through [`GpuContext::release_allocator`].
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue (frames and uploads)
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,
}

impl GpuContext {
    pub fn new(
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
        }
    }

    /// Allocate device memory for a buffer or an image
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| rafx_err!(SOURCE, "GPU allocator mutex poisoned"))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                rafx_error!(SOURCE, "Out of GPU memory for '{}' ({:.2} MB): {}", name, size_mb, e);
                ResourceError::OutOfDeviceMemory { requested: requirements.size }.into()
            })
    }

    /// Return memory to the allocator
    ///
    /// Never fails: a poisoned allocator leaks the allocation.
    pub(crate) fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Drop the allocator. Every allocation must already be freed.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, right before the device is destroyed.
    pub(crate) unsafe fn release_allocator(&mut self) {
        ManuallyDrop::drop(&mut self.allocator);
    }
}

/// Map a failed Vulkan call to a rafx error
///
/// `ERROR_DEVICE_LOST` becomes the fatal `DeviceLost`, `ERROR_OUT_OF_DATE_KHR`
/// the recoverable `SwapchainOutOfDate`. Everything else is a backend error.
pub(crate) fn vk_error(what: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => {
            rafx_error!(SOURCE, "Device lost during {}", what);
            DeviceError::DeviceLost(format!("{}: {:?}", what, result)).into()
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => DeviceError::SwapchainOutOfDate.into(),
        _ => rafx_err!(SOURCE, "{} failed: {:?}", what, result),
    }
}

/// Same as [`vk_error`] but for device setup, where every failure is fatal
pub(crate) fn init_error(what: &str, detail: impl std::fmt::Debug) -> Error {
    rafx_error!(SOURCE, "{}: {:?}", what, detail);
    DeviceError::InitializationFailed(format!("{}: {:?}", what, detail)).into()
}
