/// VulkanTexture - native image, its view and memory

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use rafx_core::rafx::{Result, TextureAspect, TextureDesc};
use rafx_core::rafx_err;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{format_to_vk, full_range, texture_usage_to_vk, view_aspect};

/// Vulkan texture
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// View used for sampling and as attachment
    pub(crate) view: vk::ImageView,
    /// Attachment view covering depth and stencil (depth/stencil formats only)
    pub(crate) attachment_view: Option<vk::ImageView>,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) extent: vk::Extent3D,
    pub(crate) aspect: TextureAspect,
}

impl VulkanTexture {
    /// Create an image with one mip level and its views
    ///
    /// `extra_usage` is or-ed into the described usage (TRANSFER_DST for uploads).
    pub(crate) fn new(
        ctx: &Arc<GpuContext>,
        desc: &TextureDesc,
        extra_usage: vk::ImageUsageFlags,
    ) -> Result<Self> {
        let name = desc.debug_name.as_deref().unwrap_or("texture");
        let format = format_to_vk(desc.format);
        let aspect = desc.format.aspect();
        let extent = vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
        };
        let (image_type, view_type) = if desc.depth > 1 {
            (vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D)
        } else {
            (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D)
        };

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(image_type)
                .format(format)
                .extent(extent)
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage) | extra_usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| rafx_err!(SOURCE, "Failed to create image '{}': {:?}", name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(name, requirements, gpu_allocator::MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // From here on, Drop releases whatever was created
            let mut texture = Self {
                ctx: Arc::clone(ctx),
                image,
                view: vk::ImageView::null(),
                attachment_view: None,
                allocation: Some(allocation),
                extent,
                aspect,
            };

            if let Some(allocation) = &texture.allocation {
                ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| rafx_err!(SOURCE, "Failed to bind memory of image '{}': {:?}", name, e))?;
            }

            texture.view = create_view(&ctx.device, image, view_type, format, view_aspect(aspect))
                .map_err(|e| rafx_err!(SOURCE, "Failed to create view of '{}': {:?}", name, e))?;

            if aspect == TextureAspect::DepthStencil {
                let view = create_view(
                    &ctx.device,
                    image,
                    view_type,
                    format,
                    vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                )
                .map_err(|e| rafx_err!(SOURCE, "Failed to create attachment view of '{}': {:?}", name, e))?;
                texture.attachment_view = Some(view);
            }

            Ok(texture)
        }
    }

    /// View to bind as a render pass attachment
    pub(crate) fn render_view(&self) -> vk::ImageView {
        self.attachment_view.unwrap_or(self.view)
    }

    pub fn raw(&self) -> vk::Image {
        self.image
    }
}

pub(crate) fn create_view(
    device: &ash::Device,
    image: vk::Image,
    view_type: vk::ImageViewType,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> std::result::Result<vk::ImageView, vk::Result> {
    let info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(full_range(aspect_mask));
    unsafe { device.create_image_view(&info, None) }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if let Some(view) = self.attachment_view.take() {
                self.ctx.device.destroy_image_view(view, None);
            }
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
