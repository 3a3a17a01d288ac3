/// HeadlessDevice - `GraphicsDevice` without a GPU
///
/// Simulates what the core relies on: a memory budget, a swapchain image
/// ring, a transfer timeline for uploads and a completion timeline for
/// submitted serials. Every submission is checked handle by handle against
/// the registry and the pipeline cache, so a native object released while
/// still referenced surfaces as `DeviceLost`.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::{DeviceError, ResourceError, Result};
use crate::gpu::{
    BufferDesc, Capabilities, Command, CompiledShader, Created, DebugObject, Format,
    GraphicsDevice, PipelineDesc, ResourceState, Submission, SwapchainInfo, SyncModel,
    TextureDesc, TextureTarget, TextureUsage,
};
use crate::{rafx_debug, rafx_error, rafx_info, rafx_trace};

const SOURCE: &str = "rafx::headless";

// ============================================================================
// Configuration
// ============================================================================

/// When submitted serials complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Every serial completes as soon as it is submitted
    Immediate,
    /// Serials complete only through [`HeadlessDevice::complete_through`]
    Manual,
}

/// Headless device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessConfig {
    pub sync_model: SyncModel,
    pub completion: CompletionMode,
    /// Bytes available to buffers and textures
    pub memory_budget: u64,
    pub max_push_constant_size: u32,
    pub max_bindless_textures: u32,
    pub max_viewports: u32,
    pub swapchain_format: Format,
    pub swapchain_width: u32,
    pub swapchain_height: u32,
    pub swapchain_image_count: u32,
    /// Formats reported as unsupported for every usage
    pub unsupported_formats: Vec<Format>,
    /// Whether uploads go through the transfer timeline (tickets) or are
    /// ordered by the graphics queue
    pub upload_tickets: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            sync_model: SyncModel::ExplicitBarriers,
            completion: CompletionMode::Immediate,
            memory_budget: 256 * 1024 * 1024,
            max_push_constant_size: 256,
            max_bindless_textures: 1024,
            max_viewports: 16,
            swapchain_format: Format::B8G8R8A8_SRGB,
            swapchain_width: 1280,
            swapchain_height: 720,
            swapchain_image_count: 3,
            unsupported_formats: Vec::new(),
            upload_tickets: true,
        }
    }
}

// ============================================================================
// Native objects
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessBuffer {
    pub id: u64,
    pub size: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub size: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessShaderModule {
    pub id: u64,
    pub name: String,
    pub entry_points: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessPipeline {
    pub id: u64,
    pub desc: PipelineDesc,
    pub push_constant_size: u32,
}

// ============================================================================
// Inspection
// ============================================================================

/// Observable side effect of a device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadlessEvent {
    BufferCreated { id: u64, size: u64 },
    BufferReleased { id: u64 },
    TextureCreated { id: u64 },
    TextureReleased { id: u64 },
    BindlessWrite { slot: u32, texture: Option<u64> },
    DebugName { id: u64, name: String },
    ShaderModuleCreated { id: u64 },
    ShaderModuleReleased { id: u64 },
    PipelineCreated { id: u64 },
    PipelineReleased { id: u64 },
    SwapchainResized { width: u32, height: u32 },
}

/// One frame as the device received it
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFrame {
    pub serial: u64,
    pub frame_index: usize,
    pub image_index: u32,
    pub wait_transfer: Option<u64>,
    pub commands: Vec<Command>,
}

impl SubmittedFrame {
    /// Synchronization commands (barriers or usage declarations)
    pub fn sync_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_synchronization()).count()
    }

    /// Draw and indexed draw commands
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. } | Command::DrawIndexed { .. }))
            .count()
    }
}

// ============================================================================
// Device
// ============================================================================

pub struct HeadlessDevice {
    config: HeadlessConfig,
    capabilities: Capabilities,
    swapchain: SwapchainInfo,
    next_id: u64,
    memory_used: u64,
    buffer_data: FxHashMap<u64, Vec<u8>>,
    live_buffers: usize,
    live_textures: usize,
    live_pipelines: usize,
    live_shader_modules: usize,
    bindless: Vec<Option<u64>>,
    frames_configured: usize,
    next_image: u32,
    transfer_serial: u64,
    submitted_serial: u64,
    completed_serial: u64,
    out_of_date_at_acquire: bool,
    out_of_date_at_present: bool,
    lost: Option<String>,
    frames: Vec<SubmittedFrame>,
    presents: Vec<(usize, u32)>,
    events: Vec<HeadlessEvent>,
}

impl HeadlessDevice {
    pub fn new(config: HeadlessConfig) -> Self {
        let capabilities = Capabilities {
            name: "Headless".to_string(),
            sync_model: config.sync_model,
            max_push_constant_size: config.max_push_constant_size,
            max_bindless_textures: config.max_bindless_textures,
            max_viewports: config.max_viewports,
        };
        let swapchain = SwapchainInfo {
            format: config.swapchain_format,
            width: config.swapchain_width,
            height: config.swapchain_height,
            image_count: config.swapchain_image_count,
        };
        rafx_info!(
            SOURCE,
            "Headless device created ({:?}, {:?}, swapchain {}x{})",
            config.sync_model,
            config.completion,
            swapchain.width,
            swapchain.height
        );
        Self {
            bindless: vec![None; config.max_bindless_textures as usize],
            config,
            capabilities,
            swapchain,
            next_id: 1,
            memory_used: 0,
            buffer_data: FxHashMap::default(),
            live_buffers: 0,
            live_textures: 0,
            live_pipelines: 0,
            live_shader_modules: 0,
            frames_configured: 0,
            next_image: 0,
            transfer_serial: 0,
            submitted_serial: 0,
            completed_serial: 0,
            out_of_date_at_acquire: false,
            out_of_date_at_present: false,
            lost: None,
            frames: Vec::new(),
            presents: Vec::new(),
            events: Vec::new(),
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn reserve_memory(&mut self, size: u64) -> Result<()> {
        let within_budget = self
            .memory_used
            .checked_add(size)
            .is_some_and(|total| total <= self.config.memory_budget);
        if !within_budget {
            rafx_error!(
                SOURCE,
                "Allocation of {} bytes exceeds budget ({} of {} used)",
                size,
                self.memory_used,
                self.config.memory_budget
            );
            return Err(ResourceError::OutOfDeviceMemory { requested: size }.into());
        }
        self.memory_used += size;
        Ok(())
    }

    fn check_alive(&self) -> Result<()> {
        match &self.lost {
            Some(reason) => Err(DeviceError::DeviceLost(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn next_upload_ticket(&mut self) -> Option<u64> {
        if self.config.upload_tickets {
            self.transfer_serial += 1;
            Some(self.transfer_serial)
        } else {
            None
        }
    }

    // ===== SIMULATION CONTROLS =====

    /// Complete every submitted serial up to `serial` (manual mode)
    pub fn complete_through(&mut self, serial: u64) {
        let target = serial.min(self.submitted_serial);
        if target > self.completed_serial {
            self.completed_serial = target;
            rafx_trace!(SOURCE, "Completed through serial {}", target);
        }
    }

    /// Complete everything submitted so far
    pub fn complete_all(&mut self) {
        self.complete_through(self.submitted_serial);
    }

    /// Make the next acquire report `SwapchainOutOfDate` until `resize`
    pub fn force_out_of_date(&mut self) {
        self.out_of_date_at_acquire = true;
    }

    /// Make the next present report `SwapchainOutOfDate`
    pub fn force_out_of_date_at_present(&mut self) {
        self.out_of_date_at_present = true;
    }

    /// Lose the device: every later frame call fails with `DeviceLost`
    pub fn fail_device(&mut self, reason: &str) {
        rafx_error!(SOURCE, "Device lost: {}", reason);
        self.lost = Some(reason.to_string());
    }

    // ===== INSPECTION =====

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    pub fn submitted_frames(&self) -> &[SubmittedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&SubmittedFrame> {
        self.frames.last()
    }

    /// Presented (frame slot, image index) pairs, in order
    pub fn presents(&self) -> &[(usize, u32)] {
        &self.presents
    }

    pub fn events(&self) -> &[HeadlessEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<HeadlessEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn submitted_serial(&self) -> u64 {
        self.submitted_serial
    }

    /// Last issued upload ticket
    pub fn transfer_serial(&self) -> u64 {
        self.transfer_serial
    }

    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    pub fn live_pipelines(&self) -> usize {
        self.live_pipelines
    }

    pub fn live_shader_modules(&self) -> usize {
        self.live_shader_modules
    }

    pub fn frames_configured(&self) -> usize {
        self.frames_configured
    }

    /// Texture ID written into a bindless slot
    pub fn bindless_slot(&self, slot: u32) -> Option<u64> {
        self.bindless.get(slot as usize).copied().flatten()
    }

    /// Current contents of a buffer
    pub fn buffer_contents(&self, buffer: &HeadlessBuffer) -> Option<&[u8]> {
        self.buffer_data.get(&buffer.id).map(Vec::as_slice)
    }

    fn check_submission(&self, submission: &Submission<'_, Self>) -> Result<()> {
        let lost = |what: String| -> crate::error::Error {
            rafx_error!(SOURCE, "Submission {} references {}", submission.serial, what);
            DeviceError::DeviceLost(format!("submission references {}", what)).into()
        };
        let texture = |target: &TextureTarget| -> Result<()> {
            match target {
                TextureTarget::Swapchain => Ok(()),
                TextureTarget::Texture(handle) => submission
                    .resources
                    .resolve_texture(*handle)
                    .map(|_| ())
                    .ok_or_else(|| lost(format!("released texture {:?}", handle))),
            }
        };

        if submission.serial <= self.submitted_serial {
            return Err(lost(format!("stale serial (last submitted {})", self.submitted_serial)));
        }
        if let Some(ticket) = submission.wait_transfer {
            if ticket > self.transfer_serial {
                return Err(lost(format!("unknown upload ticket {}", ticket)));
            }
        }

        for command in submission.commands {
            match command {
                Command::Barrier(barrier) => texture(&barrier.target)?,
                Command::DeclareUsage { target, .. } => texture(target)?,
                Command::BeginRenderPass { colors, depth, .. } => {
                    for color in colors {
                        texture(color)?;
                    }
                    if let Some(depth) = depth {
                        texture(depth)?;
                    }
                }
                Command::BindPipeline(handle) => {
                    if submission.pipelines.resolve_pipeline(*handle).is_none() {
                        return Err(lost(format!("released pipeline {:?}", handle)));
                    }
                }
                Command::BindVertexBuffer { buffer, .. } | Command::BindIndexBuffer { buffer, .. } => {
                    if submission.resources.resolve_buffer(*buffer).is_none() {
                        return Err(lost(format!("released buffer {:?}", buffer)));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type ShaderModule = HeadlessShaderModule;
    type Pipeline = HeadlessPipeline;

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn supports_texture_format(&self, format: Format, usage: TextureUsage) -> bool {
        if self.config.unsupported_formats.contains(&format) || !format.is_texture_format() {
            return false;
        }
        if usage.contains(TextureUsage::COLOR_TARGET) && !format.is_color_renderable() {
            return false;
        }
        !(usage.contains(TextureUsage::DEPTH_STENCIL) && !format.is_depth())
    }

    fn configure_frames(&mut self, count: usize) -> Result<()> {
        self.frames_configured = count;
        rafx_debug!(SOURCE, "Configured {} frames in flight", count);
        Ok(())
    }

    // ===== RESOURCES =====

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Created<HeadlessBuffer>> {
        self.reserve_memory(desc.size)?;
        let id = self.alloc_id();
        let mut data = vec![0u8; desc.size as usize];
        let mut upload_ticket = None;
        if let Some(bytes) = initial_data {
            data[..bytes.len()].copy_from_slice(bytes);
            if !desc.memory.is_host_visible() {
                upload_ticket = self.next_upload_ticket();
            }
        }
        self.buffer_data.insert(id, data);
        self.live_buffers += 1;
        self.events.push(HeadlessEvent::BufferCreated { id, size: desc.size });
        Ok(Created {
            resource: HeadlessBuffer { id, size: desc.size },
            upload_ticket,
            initial_state: ResourceState::Undefined,
        })
    }

    fn write_buffer(&mut self, buffer: &HeadlessBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let contents = self
            .buffer_data
            .get_mut(&buffer.id)
            .ok_or_else(|| DeviceError::Backend(format!("write to released buffer {}", buffer.id)))?;
        let target = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .and_then(|range| contents.get_mut(range))
            .ok_or_else(|| {
                ResourceError::InvalidDescription(format!(
                    "write of {} bytes at offset {} exceeds buffer {}",
                    data.len(),
                    offset,
                    buffer.id
                ))
            })?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: HeadlessBuffer) {
        self.buffer_data.remove(&buffer.id);
        self.memory_used -= buffer.size;
        self.live_buffers -= 1;
        self.events.push(HeadlessEvent::BufferReleased { id: buffer.id });
    }

    fn create_texture(&mut self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<Created<HeadlessTexture>> {
        let size = desc
            .data_size()
            .ok_or_else(|| ResourceError::InvalidDescription("texture size overflows u64".to_string()))?;
        self.reserve_memory(size)?;
        let id = self.alloc_id();
        self.live_textures += 1;
        self.events.push(HeadlessEvent::TextureCreated { id });
        let (upload_ticket, initial_state) = match initial_data {
            Some(_) => (self.next_upload_ticket(), ResourceState::ShaderRead),
            None => (None, ResourceState::Undefined),
        };
        Ok(Created {
            resource: HeadlessTexture {
                id,
                width: desc.width,
                height: desc.height,
                format: desc.format,
                size,
            },
            upload_ticket,
            initial_state,
        })
    }

    fn destroy_texture(&mut self, texture: HeadlessTexture) {
        self.memory_used -= texture.size;
        self.live_textures -= 1;
        self.events.push(HeadlessEvent::TextureReleased { id: texture.id });
    }

    fn set_debug_name(&mut self, object: DebugObject<'_, Self>, name: &str) {
        let id = match object {
            DebugObject::Buffer(buffer) => buffer.id,
            DebugObject::Texture(texture) => texture.id,
        };
        self.events.push(HeadlessEvent::DebugName { id, name: name.to_string() });
    }

    fn write_bindless_texture(&mut self, slot: u32, texture: Option<&HeadlessTexture>) {
        let id = texture.map(|t| t.id);
        if let Some(entry) = self.bindless.get_mut(slot as usize) {
            *entry = id;
        }
        self.events.push(HeadlessEvent::BindlessWrite { slot, texture: id });
    }

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&mut self, shader: &CompiledShader) -> Result<HeadlessShaderModule> {
        let id = self.alloc_id();
        self.live_shader_modules += 1;
        self.events.push(HeadlessEvent::ShaderModuleCreated { id });
        Ok(HeadlessShaderModule {
            id,
            name: shader.name.clone(),
            entry_points: shader
                .entry_points
                .iter()
                .map(|ep| ep.reflection.name.clone())
                .collect(),
        })
    }

    fn destroy_shader_module(&mut self, module: HeadlessShaderModule) {
        self.live_shader_modules -= 1;
        self.events.push(HeadlessEvent::ShaderModuleReleased { id: module.id });
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        module: &HeadlessShaderModule,
        push_constant_size: u32,
    ) -> Result<HeadlessPipeline> {
        if !module.entry_points.contains(&desc.vertex_entry) {
            return Err(DeviceError::Backend(format!(
                "module '{}' has no entry point '{}'",
                module.name, desc.vertex_entry
            ))
            .into());
        }
        let id = self.alloc_id();
        self.live_pipelines += 1;
        self.events.push(HeadlessEvent::PipelineCreated { id });
        Ok(HeadlessPipeline {
            id,
            desc: desc.clone(),
            push_constant_size,
        })
    }

    fn destroy_pipeline(&mut self, pipeline: HeadlessPipeline) {
        self.live_pipelines -= 1;
        self.events.push(HeadlessEvent::PipelineReleased { id: pipeline.id });
    }

    // ===== FRAMES =====

    fn completed_serial(&mut self) -> Result<u64> {
        self.check_alive()?;
        Ok(self.completed_serial)
    }

    fn wait_for_serial(&mut self, serial: u64, _timeout: Duration) -> Result<bool> {
        self.check_alive()?;
        if self.config.completion == CompletionMode::Immediate {
            self.complete_through(serial);
        }
        // Manual mode never progresses while waiting: the wait times out
        Ok(self.completed_serial >= serial)
    }

    fn acquire_next_image(&mut self, _frame_index: usize) -> Result<u32> {
        self.check_alive()?;
        if self.out_of_date_at_acquire {
            return Err(DeviceError::SwapchainOutOfDate.into());
        }
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.swapchain.image_count.max(1);
        Ok(image)
    }

    fn submit(&mut self, submission: &Submission<'_, Self>) -> Result<()> {
        self.check_alive()?;
        self.check_submission(submission)?;
        self.submitted_serial = submission.serial;
        if self.config.completion == CompletionMode::Immediate {
            self.completed_serial = submission.serial;
        }
        self.frames.push(SubmittedFrame {
            serial: submission.serial,
            frame_index: submission.frame_index,
            image_index: submission.image_index,
            wait_transfer: submission.wait_transfer,
            commands: submission.commands.to_vec(),
        });
        rafx_trace!(
            SOURCE,
            "Submitted serial {} ({} commands)",
            submission.serial,
            submission.commands.len()
        );
        Ok(())
    }

    fn present(&mut self, frame_index: usize, image_index: u32) -> Result<()> {
        self.check_alive()?;
        self.presents.push((frame_index, image_index));
        if self.out_of_date_at_present {
            self.out_of_date_at_present = false;
            self.out_of_date_at_acquire = true;
            return Err(DeviceError::SwapchainOutOfDate.into());
        }
        Ok(())
    }

    fn swapchain(&self) -> SwapchainInfo {
        self.swapchain
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.check_alive()?;
        if width == 0 || height == 0 {
            return Err(DeviceError::Backend(format!("invalid swapchain size {}x{}", width, height)).into());
        }
        self.swapchain.width = width;
        self.swapchain.height = height;
        self.next_image = 0;
        self.out_of_date_at_acquire = false;
        self.events.push(HeadlessEvent::SwapchainResized { width, height });
        rafx_debug!(SOURCE, "Swapchain resized to {}x{}", width, height);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        // The simulated queue drains on idle, in both completion modes
        self.complete_all();
        self.check_alive()
    }
}

#[cfg(test)]
#[path = "headless_device_tests.rs"]
mod tests;
