/// VulkanSwapchain - presentation to the window surface
///
/// Owns the surface, the swapchain images and one render-finished semaphore
/// per image. Acquire semaphores belong to the frame slots.

use ash::vk;
use rafx_core::rafx::{Format, Result, SwapchainInfo};
use rafx_core::{rafx_bail, rafx_debug, rafx_err, rafx_info, rafx_trace};
use std::sync::Arc;

use crate::vulkan_context::{init_error, vk_error, GpuContext, SOURCE};
use crate::vulkan_format::vk_format_to_format;
use crate::vulkan_texture::create_view;

pub(crate) struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    render_finished: Vec<vk::Semaphore>,
    surface_format: vk::SurfaceFormatKHR,
    format: Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

/// Preferred surface format: sRGB BGRA/RGBA, else the first format rafx can name
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, Format)> {
    let preferred = formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB);
    preferred
        .into_iter()
        .chain(formats.iter())
        .find_map(|f| vk_format_to_format(f.format).map(|format| (*f, format)))
}

/// FIFO with vsync, otherwise the lowest latency mode available
fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

impl VulkanSwapchain {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: &Arc<GpuContext>,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let (surface_format, format, present_mode) = unsafe {
            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| init_error("Failed to query surface formats", e))?;
            let (surface_format, format) = choose_surface_format(&formats)
                .ok_or_else(|| init_error("No supported surface format", formats.len()))?;

            let modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| init_error("Failed to query present modes", e))?;
            (surface_format, format, choose_present_mode(&modes, vsync))
        };

        let mut swapchain = Self {
            ctx: Arc::clone(ctx),
            physical_device,
            surface,
            swapchain_loader: ash::khr::swapchain::Device::new(instance, &ctx.device),
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            render_finished: Vec::new(),
            surface_format,
            format,
            extent: vk::Extent2D { width, height },
            present_mode,
        };
        swapchain.build(width, height)?;
        rafx_info!(
            SOURCE,
            "Swapchain created: {}x{} {:?}, {} images, {:?}",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.format,
            swapchain.images.len(),
            swapchain.present_mode
        );
        Ok(swapchain)
    }

    /// (Re)create the swapchain, retiring the current one
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let device = &ctx.device;
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| vk_error("query surface capabilities", e))?;
            let extent = choose_extent(&capabilities, width, height);
            if extent.width == 0 || extent.height == 0 {
                rafx_bail!(SOURCE, "Cannot build a {}x{} swapchain", extent.width, extent.height);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| vk_error("create swapchain", e))?;

            self.destroy_images();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_error("get swapchain images", e))?;

            for &image in &self.images {
                let view = create_view(
                    device,
                    image,
                    vk::ImageViewType::TYPE_2D,
                    self.surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                )
                .map_err(|e| vk_error("create swapchain image view", e))?;
                self.views.push(view);

                let semaphore = device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| vk_error("create render-finished semaphore", e))?;
                self.render_finished.push(semaphore);
            }
        }
        Ok(())
    }

    fn destroy_images(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
        }
        self.images.clear();
    }

    /// Rebuild for a new window size. The device must be idle.
    pub(crate) fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.build(width, height)?;
        rafx_debug!(SOURCE, "Swapchain recreated: {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    pub(crate) fn acquire(&self, semaphore: vk::Semaphore) -> Result<u32> {
        unsafe {
            match self
                .swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
            {
                Ok((image_index, suboptimal)) => {
                    if suboptimal {
                        rafx_trace!(SOURCE, "Swapchain suboptimal on acquire");
                    }
                    Ok(image_index)
                }
                Err(e) => Err(vk_error("acquire swapchain image", e)),
            }
        }
    }

    /// Present `image_index` once its render-finished semaphore is signaled
    pub(crate) fn present(&self, image_index: u32) -> Result<()> {
        let wait = [self.render_finished_semaphore(image_index)?];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        unsafe {
            match self.swapchain_loader.queue_present(self.ctx.graphics_queue, &present_info) {
                Ok(suboptimal) => {
                    if suboptimal {
                        rafx_trace!(SOURCE, "Swapchain suboptimal on present");
                    }
                    Ok(())
                }
                Err(e) => Err(vk_error("present", e)),
            }
        }
    }

    pub(crate) fn render_finished_semaphore(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| rafx_err!(SOURCE, "Swapchain image {} out of range", image_index))
    }

    /// Image and view of a swapchain image
    pub(crate) fn target(&self, image_index: u32) -> Option<(vk::Image, vk::ImageView)> {
        let index = image_index as usize;
        Some((*self.images.get(index)?, *self.views.get(index)?))
    }

    pub(crate) fn info(&self) -> SwapchainInfo {
        SwapchainInfo {
            format: self.format,
            width: self.extent.width,
            height: self.extent.height,
            image_count: self.images.len() as u32,
        }
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        self.destroy_images();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let formats = [
            vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_UNORM, ..Default::default() },
            vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_SRGB, ..Default::default() },
        ];
        let (surface, format) = choose_surface_format(&formats).unwrap();
        assert_eq!(surface.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(format, Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_surface_format_falls_back_to_known_format() {
        let formats = [
            vk::SurfaceFormatKHR { format: vk::Format::A2B10G10R10_UNORM_PACK32, ..Default::default() },
            vk::SurfaceFormatKHR { format: vk::Format::R8G8B8A8_UNORM, ..Default::default() },
        ];
        let (_, format) = choose_surface_format(&formats).unwrap();
        assert_eq!(format, Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&formats[..1]).is_none());
    }

    #[test]
    fn test_present_mode_vsync_is_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_current_or_clamps() {
        assert_eq!(choose_extent(&capabilities((800, 600), 2, 3), 1280, 720).width, 800);
        let free = capabilities((u32::MAX, u32::MAX), 2, 3);
        let extent = choose_extent(&free, 8000, 720);
        assert_eq!((extent.width, extent.height), (4096, 720));
    }

    #[test]
    fn test_image_count_respects_max() {
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0)), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 2)), 2);
    }
}
