/// Bindless texture table
///
/// One descriptor set shared by every pipeline:
/// - binding 0: `SAMPLED_IMAGE` array, indexed by texture IDs
/// - binding 1: immutable samplers (index 0 = linear clamp)
///
/// The array is partially bound and update-after-bind, so slots can be
/// rewritten while earlier frames using other slots are in flight.

use ash::vk;
use rafx_core::rafx::Result;
use rafx_core::rafx_trace;
use std::sync::Arc;

use crate::vulkan_context::{init_error, GpuContext, SOURCE};
use crate::vulkan_texture::VulkanTexture;

pub(crate) const TEXTURE_BINDING: u32 = 0;
pub(crate) const SAMPLER_BINDING: u32 = 1;

pub(crate) struct BindlessTable {
    ctx: Arc<GpuContext>,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    pub(crate) set: vk::DescriptorSet,
    samplers: Vec<vk::Sampler>,
    capacity: u32,
}

impl BindlessTable {
    pub(crate) fn new(ctx: &Arc<GpuContext>, capacity: u32) -> Result<Self> {
        let device = &ctx.device;
        let mut table = Self {
            ctx: Arc::clone(ctx),
            set_layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            set: vk::DescriptorSet::null(),
            samplers: Vec::new(),
            capacity,
        };

        unsafe {
            let linear_clamp = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                .max_lod(vk::LOD_CLAMP_NONE);
            let sampler = device
                .create_sampler(&linear_clamp, None)
                .map_err(|e| init_error("Failed to create linear clamp sampler", e))?;
            table.samplers.push(sampler);

            let bindings = [
                vk::DescriptorSetLayoutBinding::default()
                    .binding(TEXTURE_BINDING)
                    .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                    .descriptor_count(capacity)
                    .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS),
                vk::DescriptorSetLayoutBinding::default()
                    .binding(SAMPLER_BINDING)
                    .descriptor_type(vk::DescriptorType::SAMPLER)
                    .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)
                    .immutable_samplers(&table.samplers),
            ];
            let binding_flags = [
                vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND,
                vk::DescriptorBindingFlags::empty(),
            ];
            let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
                .binding_flags(&binding_flags);
            let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
                .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
                .bindings(&bindings)
                .push_next(&mut flags_info);
            table.set_layout = device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| init_error("Failed to create bindless set layout", e))?;

            let pool_sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: capacity,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: table.samplers.len() as u32,
                },
            ];
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
                .max_sets(1)
                .pool_sizes(&pool_sizes);
            table.pool = device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|e| init_error("Failed to create bindless descriptor pool", e))?;

            let layouts = [table.set_layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(table.pool)
                .set_layouts(&layouts);
            table.set = device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| init_error("Failed to allocate bindless descriptor set", e))?
                .into_iter()
                .next()
                .ok_or_else(|| init_error("Failed to allocate bindless descriptor set", "empty result"))?;
        }

        Ok(table)
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Point `slot` at `texture`
    ///
    /// Clearing only forgets the slot: partially bound descriptors are never
    /// read unless a shader indexes them, and a reused slot is overwritten.
    pub(crate) fn write(&self, slot: u32, texture: Option<&VulkanTexture>) {
        let Some(texture) = texture else {
            rafx_trace!(SOURCE, "Bindless slot {} cleared", slot);
            return;
        };
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(texture.view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(TEXTURE_BINDING)
            .dst_array_element(slot)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(&image_info);
        unsafe {
            self.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        rafx_trace!(SOURCE, "Bindless slot {} written", slot);
    }

    /// Destroy the set, pool, layout and samplers. The device must be idle.
    pub(crate) fn destroy(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            if self.pool != vk::DescriptorPool::null() {
                device.destroy_descriptor_pool(self.pool, None);
            }
            if self.set_layout != vk::DescriptorSetLayout::null() {
                device.destroy_descriptor_set_layout(self.set_layout, None);
            }
            for sampler in self.samplers.drain(..) {
                device.destroy_sampler(sampler, None);
            }
        }
        self.pool = vk::DescriptorPool::null();
        self.set_layout = vk::DescriptorSetLayout::null();
        self.set = vk::DescriptorSet::null();
    }
}

impl Drop for BindlessTable {
    fn drop(&mut self) {
        self.destroy();
    }
}
