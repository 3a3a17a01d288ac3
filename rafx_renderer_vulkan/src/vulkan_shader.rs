/// VulkanShaderModule - one `vk::ShaderModule` per compiled entry point

use ash::vk;
use rafx_core::rafx::{CompiledShader, Result, ShaderCode, ShaderStage};
use rafx_core::{rafx_bail, rafx_err};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};

pub(crate) struct ShaderEntry {
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: ShaderStage,
    /// Entry point name inside the SPIR-V
    pub(crate) name: CString,
}

/// Vulkan shader module
pub struct VulkanShaderModule {
    ctx: Arc<GpuContext>,
    pub(crate) entries: FxHashMap<String, ShaderEntry>,
}

impl VulkanShaderModule {
    pub(crate) fn new(ctx: &Arc<GpuContext>, shader: &CompiledShader) -> Result<Self> {
        let mut module = Self {
            ctx: Arc::clone(ctx),
            entries: FxHashMap::default(),
        };

        for entry_point in &shader.entry_points {
            let name = &entry_point.reflection.name;
            let words = match &entry_point.code {
                ShaderCode::Spirv(words) => words,
                ShaderCode::Source(_) => {
                    rafx_bail!(SOURCE, "Shader '{}' entry '{}' is not SPIR-V", shader.name, name);
                }
            };
            let c_name = CString::new(name.as_str())
                .map_err(|_| rafx_err!(SOURCE, "Entry point name '{}' contains a NUL byte", name))?;
            let create_info = vk::ShaderModuleCreateInfo::default().code(words);
            let vk_module = unsafe {
                ctx.device
                    .create_shader_module(&create_info, None)
                    .map_err(|e| rafx_err!(SOURCE, "Failed to create shader module '{}::{}': {:?}", shader.name, name, e))?
            };
            module.entries.insert(
                name.clone(),
                ShaderEntry {
                    module: vk_module,
                    stage: entry_point.reflection.stage,
                    name: c_name,
                },
            );
        }
        Ok(module)
    }

    pub(crate) fn entry(&self, name: &str) -> Result<&ShaderEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| rafx_err!(SOURCE, "Shader module has no entry point '{}'", name))
    }
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            unsafe {
                self.ctx.device.destroy_shader_module(entry.module, None);
            }
        }
    }
}
