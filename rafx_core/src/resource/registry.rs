/// ResourceRegistry - owns every buffer and texture of a render context
///
/// Handles are generational slotmap keys. Destruction is deferred: a
/// destroyed handle is rejected for new use at once, but its native object
/// (and bindless slot) survive until the last frame that referenced it has
/// completed on the device.

use slotmap::SlotMap;

use crate::error::{HandleKind, ResourceError, Result};
use crate::gpu::{
    BufferDesc, BufferHandle, BufferInfo, DebugObject, Format, GraphicsDevice, ResourceState,
    TextureDesc, TextureHandle, TextureInfo, TextureUsage,
};
use crate::utils::SlotAllocator;
use crate::{rafx_debug, rafx_trace, rafx_warn};

const SOURCE: &str = "rafx::registry";

struct BufferEntry<D: GraphicsDevice> {
    native: D::Buffer,
    info: BufferInfo,
    upload_ticket: Option<u64>,
    /// Serial of the last frame that referenced the buffer (0 = never)
    last_used: u64,
    retired: bool,
}

struct TextureEntry<D: GraphicsDevice> {
    native: D::Texture,
    info: TextureInfo,
    upload_ticket: Option<u64>,
    last_used: u64,
    retired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRelease {
    Buffer(BufferHandle),
    Texture(TextureHandle),
}

/// Registry of buffers and textures
pub struct ResourceRegistry<D: GraphicsDevice> {
    buffers: SlotMap<BufferHandle, BufferEntry<D>>,
    textures: SlotMap<TextureHandle, TextureEntry<D>>,
    bindless: SlotAllocator,
    /// Destroyed resources and the serial that must complete before release
    pending: Vec<(PendingRelease, u64)>,
}

impl<D: GraphicsDevice> ResourceRegistry<D> {
    /// Create an empty registry with a bindless table of `max_bindless_textures` slots
    pub fn new(max_bindless_textures: u32) -> Self {
        Self {
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            bindless: SlotAllocator::with_capacity(max_bindless_textures),
            pending: Vec::new(),
        }
    }

    // ===== CREATION =====

    /// Create a buffer, uploading `initial_data` when supplied
    ///
    /// # Errors
    ///
    /// - `InvalidDescription` / `UnsupportedUsageCombination` for a malformed desc
    /// - `OutOfDeviceMemory` when the device cannot allocate
    pub fn create_buffer(
        &mut self,
        device: &mut D,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferHandle> {
        desc.validate(initial_data)?;
        let created = device.create_buffer(desc, initial_data)?;
        if let Some(name) = &desc.debug_name {
            device.set_debug_name(DebugObject::Buffer(&created.resource), name);
        }
        let handle = self.buffers.insert(BufferEntry {
            native: created.resource,
            info: BufferInfo::from(desc),
            upload_ticket: created.upload_ticket,
            last_used: 0,
            retired: false,
        });
        rafx_debug!(
            SOURCE,
            "Created buffer {:?} ({} bytes, {:?}, {:?})",
            handle,
            desc.size,
            desc.usage,
            desc.memory
        );
        Ok(handle)
    }

    /// Create a texture, uploading `initial_data` when supplied
    ///
    /// Shader-readable textures receive a bindless ID.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` when the device cannot back the format/usage
    /// - `BindlessTableFull` when no bindless slot is left
    /// - `OutOfDeviceMemory` when the device cannot allocate
    pub fn create_texture(
        &mut self,
        device: &mut D,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<TextureHandle> {
        desc.validate(initial_data)?;
        if !device.supports_texture_format(desc.format, desc.usage) {
            return Err(ResourceError::UnsupportedFormat(desc.format).into());
        }

        let bindless_id = if desc.usage.contains(TextureUsage::SHADER_RESOURCE) {
            let id = self.bindless.alloc().ok_or(ResourceError::BindlessTableFull {
                capacity: self.bindless.capacity(),
            })?;
            Some(id)
        } else {
            None
        };

        let created = match device.create_texture(desc, initial_data) {
            Ok(created) => created,
            Err(e) => {
                if let Some(id) = bindless_id {
                    self.bindless.free(id);
                }
                return Err(e);
            }
        };

        if let Some(id) = bindless_id {
            device.write_bindless_texture(id, Some(&created.resource));
        }
        if let Some(name) = &desc.debug_name {
            device.set_debug_name(DebugObject::Texture(&created.resource), name);
        }

        let handle = self.textures.insert(TextureEntry {
            native: created.resource,
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                depth: desc.depth,
                format: desc.format,
                usage: desc.usage,
                state: created.initial_state,
                bindless_id,
                debug_name: desc.debug_name.clone(),
            },
            upload_ticket: created.upload_ticket,
            last_used: 0,
            retired: false,
        });
        rafx_debug!(
            SOURCE,
            "Created texture {:?} ({}x{}x{} {:?}, bindless {:?})",
            handle,
            desc.width,
            desc.height,
            desc.depth,
            desc.format,
            bindless_id
        );
        Ok(handle)
    }

    // ===== DESTRUCTION =====

    /// Destroy a buffer
    ///
    /// The handle becomes invalid immediately; the native buffer is released
    /// once every frame that used it has completed.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        let entry = self
            .buffers
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Buffer))?;
        entry.retired = true;
        self.pending.push((PendingRelease::Buffer(handle), entry.last_used));
        rafx_trace!(SOURCE, "Buffer {:?} retired after serial {}", handle, entry.last_used);
        Ok(())
    }

    /// Destroy a texture (deferred like [`Self::destroy_buffer`])
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<()> {
        let entry = self
            .textures
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Texture))?;
        entry.retired = true;
        self.pending.push((PendingRelease::Texture(handle), entry.last_used));
        rafx_trace!(SOURCE, "Texture {:?} retired after serial {}", handle, entry.last_used);
        Ok(())
    }

    /// Release every destroyed resource whose last use completed
    ///
    /// Returns the number of native objects released.
    pub fn reconcile(&mut self, device: &mut D, completed_serial: u64) -> usize {
        let mut released = 0;
        let mut i = 0;
        while i < self.pending.len() {
            let (release, retire_after) = self.pending[i];
            if retire_after > completed_serial {
                i += 1;
                continue;
            }
            self.pending.swap_remove(i);
            match release {
                PendingRelease::Buffer(handle) => {
                    if let Some(entry) = self.buffers.remove(handle) {
                        device.destroy_buffer(entry.native);
                        released += 1;
                    }
                }
                PendingRelease::Texture(handle) => {
                    if let Some(entry) = self.textures.remove(handle) {
                        if let Some(id) = entry.info.bindless_id {
                            device.write_bindless_texture(id, None);
                            self.bindless.free(id);
                        }
                        device.destroy_texture(entry.native);
                        released += 1;
                    }
                }
            }
        }
        if released > 0 {
            rafx_debug!(SOURCE, "Released {} resources (completed serial {})", released, completed_serial);
        }
        released
    }

    /// Release everything, live or pending. The device must be idle.
    pub fn release_all(&mut self, device: &mut D) {
        self.pending.clear();
        for (_, entry) in self.buffers.drain() {
            device.destroy_buffer(entry.native);
        }
        for (_, entry) in self.textures.drain() {
            if let Some(id) = entry.info.bindless_id {
                device.write_bindless_texture(id, None);
                self.bindless.free(id);
            }
            device.destroy_texture(entry.native);
        }
    }

    // ===== NAMES & QUERIES =====

    pub fn set_buffer_name(&mut self, device: &mut D, handle: BufferHandle, name: &str) -> Result<()> {
        let entry = self
            .buffers
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Buffer))?;
        device.set_debug_name(DebugObject::Buffer(&entry.native), name);
        entry.info.debug_name = Some(name.to_string());
        Ok(())
    }

    pub fn set_texture_name(&mut self, device: &mut D, handle: TextureHandle, name: &str) -> Result<()> {
        let entry = self
            .textures
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Texture))?;
        device.set_debug_name(DebugObject::Texture(&entry.native), name);
        entry.info.debug_name = Some(name.to_string());
        Ok(())
    }

    pub fn buffer_info(&self, handle: BufferHandle) -> Result<&BufferInfo> {
        self.buffers
            .get(handle)
            .filter(|e| !e.retired)
            .map(|e| &e.info)
            .ok_or_else(|| ResourceError::InvalidHandle(HandleKind::Buffer).into())
    }

    pub fn texture_info(&self, handle: TextureHandle) -> Result<&TextureInfo> {
        self.textures
            .get(handle)
            .filter(|e| !e.retired)
            .map(|e| &e.info)
            .ok_or_else(|| ResourceError::InvalidHandle(HandleKind::Texture).into())
    }

    pub fn texture_format(&self, handle: TextureHandle) -> Result<Format> {
        Ok(self.texture_info(handle)?.format)
    }

    /// Width, height and depth of a texture
    pub fn texture_dimensions(&self, handle: TextureHandle) -> Result<(u32, u32, u32)> {
        Ok(self.texture_info(handle)?.dimensions())
    }

    /// Bindless ID shaders use to sample the texture
    ///
    /// # Errors
    ///
    /// `UnsupportedUsageCombination` when the texture lacks `SHADER_RESOURCE`.
    pub fn texture_id(&self, handle: TextureHandle) -> Result<u32> {
        self.texture_info(handle)?.bindless_id.ok_or_else(|| {
            ResourceError::UnsupportedUsageCombination(
                "texture has no SHADER_RESOURCE usage and no bindless ID".to_string(),
            )
            .into()
        })
    }

    /// Write CPU-visible buffer memory
    ///
    /// The caller must not overwrite bytes a pending frame still reads.
    pub fn write_buffer(&mut self, device: &mut D, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let entry = self
            .buffers
            .get(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Buffer))?;
        if !entry.info.memory.is_host_visible() {
            return Err(ResourceError::UnsupportedUsageCombination(
                "GpuOnly buffers cannot be written by the CPU".to_string(),
            )
            .into());
        }
        let in_range = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= entry.info.size);
        if !in_range {
            return Err(ResourceError::InvalidDescription(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                entry.info.size
            ))
            .into());
        }
        device.write_buffer(&entry.native, offset, data)
    }

    // ===== RECORDING SUPPORT =====

    /// Validate a buffer for recording in frame `serial` and mark it used
    ///
    /// Returns its info and pending upload ticket.
    pub(crate) fn use_buffer(&mut self, handle: BufferHandle, serial: u64) -> Result<(&BufferInfo, Option<u64>)> {
        let entry = self
            .buffers
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Buffer))?;
        entry.last_used = entry.last_used.max(serial);
        Ok((&entry.info, entry.upload_ticket))
    }

    /// Validate a texture for recording in frame `serial` and mark it used
    pub(crate) fn use_texture(&mut self, handle: TextureHandle, serial: u64) -> Result<(&TextureInfo, Option<u64>)> {
        let entry = self
            .textures
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Texture))?;
        entry.last_used = entry.last_used.max(serial);
        Ok((&entry.info, entry.upload_ticket))
    }

    /// Store the state a texture has at the end of a submitted frame
    pub(crate) fn commit_texture_state(&mut self, handle: TextureHandle, state: ResourceState) {
        if let Some(entry) = self.textures.get_mut(handle) {
            entry.info.state = state;
        } else {
            rafx_warn!(SOURCE, "State commit for released texture {:?}", handle);
        }
    }

    // ===== DEVICE RESOLUTION =====

    /// Native buffer behind a handle, including destroyed but unreleased ones
    pub fn resolve_buffer(&self, handle: BufferHandle) -> Option<&D::Buffer> {
        self.buffers.get(handle).map(|e| &e.native)
    }

    /// Native texture behind a handle, including destroyed but unreleased ones
    pub fn resolve_texture(&self, handle: TextureHandle) -> Option<&D::Texture> {
        self.textures.get(handle).map(|e| &e.native)
    }

    // ===== STATS =====

    /// Buffers usable for new work
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.values().filter(|e| !e.retired).count()
    }

    /// Textures usable for new work
    pub fn live_texture_count(&self) -> usize {
        self.textures.values().filter(|e| !e.retired).count()
    }

    /// Destroyed resources still waiting for their last frame
    pub fn pending_release_count(&self) -> usize {
        self.pending.len()
    }

    /// Bindless slots in use (pending releases included)
    pub fn bindless_slots_in_use(&self) -> u32 {
        self.bindless.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
