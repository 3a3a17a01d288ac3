/// VulkanDevice - `GraphicsDevice` implementation on Vulkan 1.3
///
/// Requires dynamic rendering, synchronization2, timeline semaphores and
/// descriptor indexing (all core in 1.3). Frame serials are values of one
/// timeline semaphore; upload tickets are values of a second one owned by
/// the upload queue.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rafx_core::rafx::{
    BufferDesc, Capabilities, CompiledShader, Created, DebugObject, Format, GraphicsDevice, PipelineDesc,
    ResourceState, Result, Submission, SwapchainInfo, SyncModel, TextureDesc, TextureUsage,
};
use rafx_core::{rafx_debug, rafx_err, rafx_error, rafx_info, rafx_trace, rafx_warn};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::Duration;

use crate::debug::{self, DebugConfig};
use crate::vulkan_bindless::BindlessTable;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{CommandReplay, FrameCommands};
use crate::vulkan_context::{init_error, vk_error, GpuContext, SOURCE};
use crate::vulkan_format::{format_to_vk, required_format_features};
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_shader::VulkanShaderModule;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanTexture;
use crate::vulkan_upload::{create_timeline_semaphore, UploadQueue};

/// Vulkan device configuration
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    pub enable_validation: bool,
    /// Validation message handling (used when validation is enabled)
    pub debug: DebugConfig,
    /// FIFO presentation
    pub vsync: bool,
    /// Requested bindless table size, clamped to the device limits
    pub max_bindless_textures: u32,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            app_name: "rafx".to_string(),
            enable_validation: cfg!(feature = "vulkan-validation"),
            debug: DebugConfig::default(),
            vsync: true,
            max_bindless_textures: 1024,
        }
    }
}

/// Features rafx needs, read back from the physical device
#[derive(Debug, Clone, Copy, Default)]
struct FeatureSupport {
    timeline_semaphore: bool,
    descriptor_indexing: bool,
    partially_bound: bool,
    sampled_image_update_after_bind: bool,
    runtime_descriptor_array: bool,
    non_uniform_indexing: bool,
    dynamic_rendering: bool,
    synchronization2: bool,
    multi_viewport: bool,
}

impl FeatureSupport {
    fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features12)
            .push_next(&mut features13);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let multi_viewport = features2.features.multi_viewport == vk::TRUE;
        Self {
            timeline_semaphore: features12.timeline_semaphore == vk::TRUE,
            descriptor_indexing: features12.descriptor_indexing == vk::TRUE,
            partially_bound: features12.descriptor_binding_partially_bound == vk::TRUE,
            sampled_image_update_after_bind: features12.descriptor_binding_sampled_image_update_after_bind
                == vk::TRUE,
            runtime_descriptor_array: features12.runtime_descriptor_array == vk::TRUE,
            non_uniform_indexing: features12.shader_sampled_image_array_non_uniform_indexing == vk::TRUE,
            dynamic_rendering: features13.dynamic_rendering == vk::TRUE,
            synchronization2: features13.synchronization2 == vk::TRUE,
            multi_viewport,
        }
    }

    fn meets_requirements(&self) -> bool {
        self.timeline_semaphore
            && self.descriptor_indexing
            && self.partially_bound
            && self.sampled_image_update_after_bind
            && self.runtime_descriptor_array
            && self.non_uniform_indexing
            && self.dynamic_rendering
            && self.synchronization2
    }
}

/// Physical device, queue family and preference score
struct Candidate {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    features: FeatureSupport,
    score: u32,
}

fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// Vulkan implementation of the rafx device contract
pub struct VulkanDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    ctx: Arc<GpuContext>,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    /// Object names and command labels (validation builds only)
    debug_utils: Option<ash::ext::debug_utils::Device>,
    capabilities: Capabilities,
    /// Signaled with each frame's serial
    frame_timeline: vk::Semaphore,
    last_submitted: u64,
    frames: Vec<FrameCommands>,
    // Dropped explicitly, before the allocator and the device
    swapchain: ManuallyDrop<VulkanSwapchain>,
    bindless: ManuallyDrop<BindlessTable>,
    uploads: ManuallyDrop<UploadQueue>,
}

impl VulkanDevice {
    /// Create a device presenting to `window`
    ///
    /// # Errors
    ///
    /// `DeviceError::InitializationFailed` when no GPU supports Vulkan 1.3
    /// with the features rafx needs, or any setup call fails.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        width: u32,
        height: u32,
        config: VulkanConfig,
    ) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("Failed to load Vulkan library", e))?;

            // ===== INSTANCE =====
            let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"rafx")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_error("Failed to get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("Failed to get required extensions", e))?
                .to_vec();
            if config.enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if config.enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| init_error("Failed to create instance", e))?;

            let debug_messenger = if config.enable_validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                debug::init_debug_config(config.debug.clone());
                let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(config.debug.severity.to_vk())
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(debug::vulkan_debug_callback));
                let messenger = debug_utils
                    .create_debug_utils_messenger(&messenger_info, None)
                    .map_err(|e| init_error("Failed to create debug messenger", e))?;
                Some((debug_utils, messenger))
            } else {
                None
            };

            // ===== SURFACE =====
            let window_handle = window
                .window_handle()
                .map_err(|e| init_error("Failed to get window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // ===== PHYSICAL DEVICE =====
            let candidate = Self::pick_physical_device(&instance, &surface_loader, surface)?;
            let physical_device = candidate.physical_device;
            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown GPU".to_string());

            // ===== LOGICAL DEVICE =====
            let queue_priorities = [1.0];
            let queue_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(candidate.queue_family)
                .queue_priorities(&queue_priorities)];
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            let core_features = vk::PhysicalDeviceFeatures::default().multi_viewport(candidate.features.multi_viewport);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
                .timeline_semaphore(true)
                .descriptor_indexing(true)
                .descriptor_binding_partially_bound(true)
                .descriptor_binding_sampled_image_update_after_bind(true)
                .runtime_descriptor_array(true)
                .shader_sampled_image_array_non_uniform_indexing(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);

            let device_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&core_features)
                .push_next(&mut features12)
                .push_next(&mut features13);
            let device = instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| init_error("Failed to create logical device", e))?;
            let graphics_queue = device.get_device_queue(candidate.queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error("Failed to create GPU allocator", e))?;

            let debug_utils = config
                .enable_validation
                .then(|| ash::ext::debug_utils::Device::new(&instance, &device));
            let ctx = Arc::new(GpuContext::new(device, allocator, graphics_queue, candidate.queue_family));

            // ===== DEVICE OBJECTS =====
            let frame_timeline = create_timeline_semaphore(&ctx.device)
                .map_err(|e| init_error("Failed to create frame timeline", e))?;

            let bindless_capacity = Self::bindless_capacity(&instance, physical_device, config.max_bindless_textures);
            let bindless = BindlessTable::new(&ctx, bindless_capacity)?;
            let uploads = UploadQueue::new(&ctx)?;
            let swapchain = VulkanSwapchain::new(
                &ctx,
                &instance,
                physical_device,
                surface,
                surface_loader,
                width,
                height,
                config.vsync,
            )?;

            let limits = properties.limits;
            let capabilities = Capabilities {
                name: format!("Vulkan ({})", device_name),
                sync_model: SyncModel::ExplicitBarriers,
                max_push_constant_size: limits.max_push_constants_size,
                max_bindless_textures: bindless.capacity(),
                max_viewports: if candidate.features.multi_viewport {
                    limits.max_viewports
                } else {
                    1
                },
            };
            rafx_info!(
                SOURCE,
                "Vulkan device ready: {} (validation {}, {} bindless slots, {} push-constant bytes)",
                device_name,
                if config.enable_validation { "on" } else { "off" },
                capabilities.max_bindless_textures,
                capabilities.max_push_constant_size
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                ctx,
                debug_messenger,
                debug_utils,
                capabilities,
                frame_timeline,
                last_submitted: 0,
                frames: Vec::new(),
                swapchain: ManuallyDrop::new(swapchain),
                bindless: ManuallyDrop::new(bindless),
                uploads: ManuallyDrop::new(uploads),
            })
        }
    }

    /// Create a device sized to a winit window's current inner size
    pub fn for_window(window: &winit::window::Window, config: VulkanConfig) -> Result<Self> {
        let size = window.inner_size();
        Self::new(window, size.width, size.height, config)
    }

    /// Best Vulkan 1.3 device with a graphics+present queue and every required feature
    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<Candidate> {
        let physical_devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(|e| init_error("Failed to enumerate physical devices", e))?
        };

        let mut best: Option<Candidate> = None;
        for physical_device in physical_devices {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            let name = properties
                .device_name_as_c_str()
                .map(CStr::to_string_lossy)
                .unwrap_or_default()
                .into_owned();
            if properties.api_version < vk::API_VERSION_1_3 {
                rafx_debug!(SOURCE, "Skipping {}: Vulkan 1.3 not supported", name);
                continue;
            }
            let features = FeatureSupport::query(instance, physical_device);
            if !features.meets_requirements() {
                rafx_debug!(SOURCE, "Skipping {}: missing required features {:?}", name, features);
                continue;
            }

            let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let queue_family = (0..families.len() as u32).find(|&index| {
                families[index as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && unsafe {
                        surface_loader
                            .get_physical_device_surface_support(physical_device, index, surface)
                            .unwrap_or(false)
                    }
            });
            let Some(queue_family) = queue_family else {
                rafx_debug!(SOURCE, "Skipping {}: no queue can render and present", name);
                continue;
            };

            let score = device_type_score(properties.device_type);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Candidate {
                    physical_device,
                    queue_family,
                    features,
                    score,
                });
            }
        }

        best.ok_or_else(|| init_error("No suitable GPU", "Vulkan 1.3 with dynamic rendering and descriptor indexing required"))
    }

    fn bindless_capacity(instance: &ash::Instance, physical_device: vk::PhysicalDevice, requested: u32) -> u32 {
        let mut properties12 = vk::PhysicalDeviceVulkan12Properties::default();
        let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut properties12);
        unsafe { instance.get_physical_device_properties2(physical_device, &mut properties2) };
        let limit = properties12
            .max_per_stage_descriptor_update_after_bind_sampled_images
            .min(properties12.max_descriptor_set_update_after_bind_sampled_images);
        if requested > limit {
            rafx_warn!(SOURCE, "Bindless table clamped from {} to {} slots", requested, limit);
        }
        requested.min(limit)
    }

    fn frame(&self, frame_index: usize) -> Result<&FrameCommands> {
        self.frames.get(frame_index).ok_or_else(|| {
            rafx_err!(SOURCE, "Frame slot {} not configured ({} slots)", frame_index, self.frames.len())
        })
    }

    /// Last serial handed to `submit`
    pub fn last_submitted_serial(&self) -> u64 {
        self.last_submitted
    }

    /// Validation message counters (all zero when validation is off)
    pub fn validation_stats(&self) -> debug::ValidationStats {
        debug::validation_stats()
    }
}

impl GraphicsDevice for VulkanDevice {
    type Buffer = VulkanBuffer;
    type Texture = VulkanTexture;
    type ShaderModule = VulkanShaderModule;
    type Pipeline = VulkanPipeline;

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn supports_texture_format(&self, format: Format, usage: TextureUsage) -> bool {
        if !format.is_texture_format() {
            return false;
        }
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format_to_vk(format))
        };
        properties
            .optimal_tiling_features
            .contains(required_format_features(usage))
    }

    fn configure_frames(&mut self, count: usize) -> Result<()> {
        if !self.frames.is_empty() {
            self.wait_idle()?;
            self.frames.clear();
        }
        for _ in 0..count {
            self.frames.push(FrameCommands::new(&self.ctx)?);
        }
        rafx_debug!(SOURCE, "Configured {} frame slots", count);
        Ok(())
    }

    // ===== RESOURCES =====

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Created<VulkanBuffer>> {
        match initial_data {
            Some(data) if !desc.memory.is_host_visible() => {
                let buffer = VulkanBuffer::new(&self.ctx, desc, vk::BufferUsageFlags::TRANSFER_DST)?;
                let ticket = self.uploads.upload_buffer(&buffer, data)?;
                Ok(Created {
                    resource: buffer,
                    upload_ticket: Some(ticket),
                    initial_state: ResourceState::Undefined,
                })
            }
            Some(data) => {
                let buffer = VulkanBuffer::new(&self.ctx, desc, vk::BufferUsageFlags::empty())?;
                buffer.write(0, data)?;
                Ok(Created::ready(buffer))
            }
            None => Ok(Created::ready(VulkanBuffer::new(&self.ctx, desc, vk::BufferUsageFlags::empty())?)),
        }
    }

    fn write_buffer(&mut self, buffer: &VulkanBuffer, offset: u64, data: &[u8]) -> Result<()> {
        buffer.write(offset, data)
    }

    fn destroy_buffer(&mut self, buffer: VulkanBuffer) {
        rafx_trace!(SOURCE, "Destroying buffer ({} bytes)", buffer.size());
        drop(buffer);
    }

    fn create_texture(&mut self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<Created<VulkanTexture>> {
        match initial_data {
            Some(data) => {
                let texture = VulkanTexture::new(&self.ctx, desc, vk::ImageUsageFlags::TRANSFER_DST)?;
                let ticket = self.uploads.upload_texture(&texture, data)?;
                Ok(Created {
                    resource: texture,
                    upload_ticket: Some(ticket),
                    initial_state: ResourceState::ShaderRead,
                })
            }
            None => Ok(Created::ready(VulkanTexture::new(&self.ctx, desc, vk::ImageUsageFlags::empty())?)),
        }
    }

    fn destroy_texture(&mut self, texture: VulkanTexture) {
        drop(texture);
    }

    fn set_debug_name(&mut self, object: DebugObject<'_, Self>, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            rafx_warn!(SOURCE, "Debug name {:?} contains a NUL byte", name);
            return;
        };
        let result = unsafe {
            match object {
                DebugObject::Buffer(buffer) => debug_utils.set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default()
                        .object_handle(buffer.buffer)
                        .object_name(&name),
                ),
                DebugObject::Texture(texture) => debug_utils.set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default()
                        .object_handle(texture.image)
                        .object_name(&name),
                ),
            }
        };
        if let Err(e) = result {
            rafx_warn!(SOURCE, "Failed to set debug name: {:?}", e);
        }
    }

    fn write_bindless_texture(&mut self, slot: u32, texture: Option<&VulkanTexture>) {
        if slot >= self.bindless.capacity() {
            rafx_error!(SOURCE, "Bindless slot {} out of range ({} slots)", slot, self.bindless.capacity());
            return;
        }
        self.bindless.write(slot, texture);
    }

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&mut self, shader: &CompiledShader) -> Result<VulkanShaderModule> {
        VulkanShaderModule::new(&self.ctx, shader)
    }

    fn destroy_shader_module(&mut self, module: VulkanShaderModule) {
        drop(module);
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        module: &VulkanShaderModule,
        push_constant_size: u32,
    ) -> Result<VulkanPipeline> {
        VulkanPipeline::new(&self.ctx, desc, module, push_constant_size, self.bindless.set_layout)
    }

    fn destroy_pipeline(&mut self, pipeline: VulkanPipeline) {
        drop(pipeline);
    }

    // ===== FRAMES =====

    fn completed_serial(&mut self) -> Result<u64> {
        self.uploads.reclaim()?;
        unsafe {
            self.ctx
                .device
                .get_semaphore_counter_value(self.frame_timeline)
                .map_err(|e| vk_error("query frame timeline", e))
        }
    }

    fn wait_for_serial(&mut self, serial: u64, timeout: Duration) -> Result<bool> {
        let semaphores = [self.frame_timeline];
        let values = [serial];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { self.ctx.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(vk_error("wait for frame serial", e)),
        }
    }

    fn acquire_next_image(&mut self, frame_index: usize) -> Result<u32> {
        let semaphore = self.frame(frame_index)?.image_acquired;
        self.swapchain.acquire(semaphore)
    }

    fn submit(&mut self, submission: &Submission<'_, Self>) -> Result<()> {
        let frame = self.frame(submission.frame_index)?;
        let cmd = frame.begin()?;
        let image_acquired = frame.image_acquired;

        CommandReplay::new(
            &self.ctx.device,
            self.debug_utils.as_ref(),
            cmd,
            submission,
            &self.swapchain,
            &self.bindless,
        )
        .record()?;

        let device = &self.ctx.device;
        unsafe {
            device
                .end_command_buffer(cmd)
                .map_err(|e| vk_error("end frame command buffer", e))?;
        }

        let mut waits = vec![vk::SemaphoreSubmitInfo::default()
            .semaphore(image_acquired)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        if let Some(ticket) = submission.wait_transfer {
            waits.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(self.uploads.timeline())
                    .value(ticket)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }
        let signals = [
            vk::SemaphoreSubmitInfo::default()
                .semaphore(self.frame_timeline)
                .value(submission.serial)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            vk::SemaphoreSubmitInfo::default()
                .semaphore(self.swapchain.render_finished_semaphore(submission.image_index)?)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
        ];
        let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd)];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);
        unsafe {
            device
                .queue_submit2(self.ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| vk_error("submit frame", e))?;
        }
        self.last_submitted = submission.serial;
        rafx_trace!(
            SOURCE,
            "Submitted frame {} ({} commands, slot {}, image {})",
            submission.serial,
            submission.commands.len(),
            submission.frame_index,
            submission.image_index
        );
        Ok(())
    }

    fn present(&mut self, _frame_index: usize, image_index: u32) -> Result<()> {
        self.swapchain.present(image_index)
    }

    fn swapchain(&self) -> SwapchainInfo {
        self.swapchain.info()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.swapchain.recreate(width, height)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| vk_error("wait for device idle", e))?;
        }
        self.uploads.reclaim()
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Device-owned objects; each releases its Arc<GpuContext>
            self.frames.clear();
            ManuallyDrop::drop(&mut self.uploads);
            ManuallyDrop::drop(&mut self.bindless);
            ManuallyDrop::drop(&mut self.swapchain);
            self.ctx.device.destroy_semaphore(self.frame_timeline, None);

            // 2. Stop routing validation messages
            debug::cleanup_debug_config();

            // 3. Allocator before the device
            match Arc::get_mut(&mut self.ctx) {
                Some(ctx) => ctx.release_allocator(),
                None => rafx_error!(SOURCE, "GPU objects outlive the device; leaking the allocator"),
            }

            // 4. Messenger, device, instance
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.ctx.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        rafx_info!(SOURCE, "Vulkan device destroyed");
    }
}
