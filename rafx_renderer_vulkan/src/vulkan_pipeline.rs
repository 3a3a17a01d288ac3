/// VulkanPipeline - graphics pipeline built for dynamic rendering
///
/// Every pipeline shares one layout shape: the bindless set at index 0 and a
/// single push-constant range visible to the vertex and fragment stages.
/// Viewports and scissors are dynamic (with count).

use ash::vk;
use rafx_core::rafx::{PipelineDesc, Result, ShaderStage};
use rafx_core::{rafx_bail, rafx_err};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{
    compare_op_to_vk, cull_mode_to_vk, format_to_vk, front_face_to_vk, shader_stage_to_vk, topology_to_vk,
};
use crate::vulkan_shader::VulkanShaderModule;

pub(crate) const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Vulkan graphics pipeline
pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) push_constant_size: u32,
}

/// Vertex bindings and attributes of an interleaved layout (binding 0)
pub(crate) fn vertex_input(
    desc: &PipelineDesc,
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    if desc.vertex_layout.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let bindings = vec![vk::VertexInputBindingDescription {
        binding: 0,
        stride: desc.vertex_stride,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attributes = desc
        .vertex_layout
        .iter()
        .map(|element| vk::VertexInputAttributeDescription {
            location: element.slot,
            binding: 0,
            format: format_to_vk(element.format),
            offset: element.offset,
        })
        .collect();
    (bindings, attributes)
}

impl VulkanPipeline {
    pub(crate) fn new(
        ctx: &Arc<GpuContext>,
        desc: &PipelineDesc,
        module: &VulkanShaderModule,
        push_constant_size: u32,
        bindless_layout: vk::DescriptorSetLayout,
    ) -> Result<Self> {
        let device = &ctx.device;

        // Shader stages
        let vertex = module.entry(&desc.vertex_entry)?;
        if vertex.stage != ShaderStage::Vertex {
            rafx_bail!(SOURCE, "Entry point '{}' is not a vertex shader", desc.vertex_entry);
        }
        let mut stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(vertex.stage))
            .module(vertex.module)
            .name(&vertex.name)];
        if let Some(fragment_entry) = &desc.fragment_entry {
            let fragment = module.entry(fragment_entry)?;
            if fragment.stage != ShaderStage::Fragment {
                rafx_bail!(SOURCE, "Entry point '{}' is not a fragment shader", fragment_entry);
            }
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(fragment.stage))
                    .module(fragment.module)
                    .name(&fragment.name),
            );
        }

        // Layout
        let set_layouts = [bindless_layout];
        let push_ranges = [vk::PushConstantRange {
            stage_flags: PUSH_CONSTANT_STAGES,
            offset: 0,
            size: push_constant_size,
        }];
        let mut layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        if push_constant_size > 0 {
            layout_info = layout_info.push_constant_ranges(&push_ranges);
        }
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| rafx_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))?
        };

        // Fixed function
        let (bindings, attributes) = vertex_input(desc);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);
        // Counts come from the dynamic *_WITH_COUNT states
        let viewport_state = vk::PipelineViewportStateCreateInfo::default();

        let mut rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.rasterizer.cull_mode))
            .front_face(front_face_to_vk(desc.rasterizer.front_face))
            .line_width(1.0);
        if let Some(bias) = desc.rasterizer.depth_bias {
            rasterization = rasterization
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_clamp(bias.clamp)
                .depth_bias_slope_factor(bias.slope_factor);
        }

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_format.is_some() && desc.depth.test)
            .depth_write_enable(desc.depth_format.is_some() && desc.depth.write)
            .depth_compare_op(compare_op_to_vk(desc.depth.compare));

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [
            vk::DynamicState::VIEWPORT_WITH_COUNT,
            vk::DynamicState::SCISSOR_WITH_COUNT,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // Attachment formats (dynamic rendering)
        let color_formats: Vec<vk::Format> = desc.color_formats.iter().map(|f| format_to_vk(*f)).collect();
        let depth_format = desc.depth_format.map(format_to_vk).unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = desc
            .depth_format
            .filter(|f| f.has_stencil())
            .map(format_to_vk)
            .unwrap_or(vk::Format::UNDEFINED);
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let pipeline = unsafe {
            match device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None) {
                Ok(pipelines) => pipelines.into_iter().next(),
                Err((_, e)) => {
                    device.destroy_pipeline_layout(layout, None);
                    return Err(rafx_err!(SOURCE, "Failed to create graphics pipeline: {:?}", e));
                }
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            rafx_bail!(SOURCE, "Driver returned no graphics pipeline");
        };

        Ok(Self {
            ctx: Arc::clone(ctx),
            pipeline,
            layout,
            push_constant_size,
        })
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
