/*!
# rafx - Vulkan Backend

Vulkan 1.3 implementation of the rafx `GraphicsDevice` contract, plus the
Slang shader compiler front-end.

Built on ash for the Vulkan bindings and gpu-allocator for memory. Rendering
uses dynamic rendering and synchronization2; textures are exposed to shaders
through one bindless descriptor set.

# Example

```no_run
use rafx_core::rafx::{ContextConfig, RenderContext};
use rafx_renderer_vulkan::{SlangCompiler, VulkanConfig, VulkanDevice};
# fn run(window: &winit::window::Window) -> rafx_core::rafx::Result<()> {
let device = VulkanDevice::for_window(window, VulkanConfig::default())?;
let _context = RenderContext::new(device, SlangCompiler::new(), ContextConfig::default())?;
# Ok(())
# }
```
*/

// Device-level modules
mod vulkan_context;
mod vulkan_format;
mod vulkan_device;
mod debug;

// Resources
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_upload;
mod vulkan_bindless;
mod vulkan_shader;
mod vulkan_pipeline;

// Frames
mod vulkan_swapchain;
mod vulkan_command_list;

mod slang_compiler;

pub use vulkan_device::{VulkanConfig, VulkanDevice};
pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_texture::VulkanTexture;
pub use vulkan_shader::VulkanShaderModule;
pub use vulkan_pipeline::VulkanPipeline;
pub use slang_compiler::{SlangCompiler, SLANGC_ENV};

// Re-export debug utilities
pub use debug::{
    print_validation_stats_report, validation_stats, DebugConfig, DebugMessageFilter, DebugSeverity,
    ValidationStats,
};
