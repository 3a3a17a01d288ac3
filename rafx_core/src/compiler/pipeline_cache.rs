/// PipelineCache - shader modules and pipelines of a render context
///
/// Shaders are compiled through the external `ShaderCompiler` and turned
/// into native modules. Pipelines are validated against the shader
/// reflection and cached by full description equality: asking twice for an
/// equal description returns the same handle without touching the device.
/// Every create takes a reference on that handle and every destroy drops
/// one; the pipeline retires when the last reference goes.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::error::{CompileError, HandleKind, ResourceError, Result};
use crate::gpu::{
    validate_vertex_layout, EntryPointReflection, GraphicsDevice, PipelineDesc, PipelineHandle,
    RenderTargetFormats, ShaderCompiler, ShaderHandle, ShaderSource, ShaderStage, TextureUsage,
};
use crate::{rafx_debug, rafx_error, rafx_info, rafx_trace};

const SOURCE: &str = "rafx::pipeline_cache";

struct ShaderEntry<D: GraphicsDevice> {
    module: D::ShaderModule,
    name: String,
    entry_points: Vec<EntryPointReflection>,
}

/// Properties of a pipeline the recorder validates against
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInfo {
    pub targets: RenderTargetFormats,
    /// Push-constant block size declared by the shader (0 = unknown/none)
    pub push_constant_size: u32,
    /// Whether the vertex stage consumes vertex buffer inputs
    pub consumes_vertices: bool,
    pub multi_viewport: bool,
}

struct PipelineEntry<D: GraphicsDevice> {
    native: D::Pipeline,
    desc: PipelineDesc,
    info: PipelineInfo,
    last_used: u64,
    /// Outstanding `create_pipeline` results for this handle
    ref_count: u32,
    retired: bool,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Shader modules and pipelines
pub struct PipelineCache<D: GraphicsDevice> {
    shaders: SlotMap<ShaderHandle, ShaderEntry<D>>,
    pipelines: SlotMap<PipelineHandle, PipelineEntry<D>>,
    lookup: FxHashMap<PipelineDesc, PipelineHandle>,
    pending: Vec<(PipelineHandle, u64)>,
    stats: PipelineCacheStats,
}

impl<D: GraphicsDevice> PipelineCache<D> {
    pub fn new() -> Self {
        Self {
            shaders: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            lookup: FxHashMap::default(),
            pending: Vec::new(),
            stats: PipelineCacheStats::default(),
        }
    }

    // ===== SHADERS =====

    /// Compile `source` and create the native shader module
    ///
    /// # Errors
    ///
    /// - `CompileError::Shader` with diagnostics from the compiler
    /// - `CompileError::EntryPointNotFound` when a requested entry point is missing
    pub fn compile_shader(
        &mut self,
        device: &mut D,
        compiler: &dyn ShaderCompiler,
        source: &ShaderSource,
    ) -> Result<ShaderHandle> {
        let compiled = compiler.compile(source).map_err(|e| {
            rafx_error!(SOURCE, "Failed to compile '{}': {}", source.name, e);
            e
        })?;

        for request in &source.entry_points {
            match compiled.entry_point(&request.name) {
                Some(ep) if ep.reflection.stage == request.stage => {}
                _ => return Err(CompileError::EntryPointNotFound(request.name.clone()).into()),
            }
        }

        let module = device.create_shader_module(&compiled)?;
        let handle = self.shaders.insert(ShaderEntry {
            module,
            name: compiled.name.clone(),
            entry_points: compiled
                .entry_points
                .iter()
                .map(|ep| ep.reflection.clone())
                .collect(),
        });
        rafx_info!(
            SOURCE,
            "Compiled shader '{}' ({} entry points)",
            compiled.name,
            compiled.entry_points.len()
        );
        Ok(handle)
    }

    /// Destroy a shader module
    ///
    /// Pipelines already built from it stay valid.
    pub fn destroy_shader(&mut self, device: &mut D, handle: ShaderHandle) -> Result<()> {
        let entry = self
            .shaders
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Shader))?;
        rafx_trace!(SOURCE, "Destroyed shader '{}'", entry.name);
        device.destroy_shader_module(entry.module);
        Ok(())
    }

    /// Reflection of one entry point
    pub fn entry_point(&self, shader: ShaderHandle, name: &str) -> Result<&EntryPointReflection> {
        let entry = self
            .shaders
            .get(shader)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Shader))?;
        entry
            .entry_points
            .iter()
            .find(|ep| ep.name == name)
            .ok_or_else(|| CompileError::EntryPointNotFound(name.to_string()).into())
    }

    // ===== PIPELINES =====

    /// Create (or fetch from cache) the pipeline for `desc`
    ///
    /// # Errors
    ///
    /// - `IncompatibleVertexLayout` when the layout does not enumerate the vertex inputs
    /// - `UnsupportedTargetFormat` when a target format is not renderable
    /// - `EntryPointNotFound` / `InvalidHandle` for unknown shader parts
    pub fn create_pipeline(&mut self, device: &mut D, desc: &PipelineDesc) -> Result<PipelineHandle> {
        if let Some(&handle) = self.lookup.get(desc) {
            if let Some(entry) = self.pipelines.get_mut(handle) {
                entry.ref_count += 1;
                self.stats.hits += 1;
                rafx_trace!(SOURCE, "Pipeline cache hit {:?} ({} refs)", handle, entry.ref_count);
                return Ok(handle);
            }
        }

        let info = self.validate(device, desc)?;
        let module = &self
            .shaders
            .get(desc.shader)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Shader))?
            .module;
        let native = device.create_pipeline(desc, module, info.push_constant_size)?;

        let handle = self.pipelines.insert(PipelineEntry {
            native,
            desc: desc.clone(),
            info,
            last_used: 0,
            ref_count: 1,
            retired: false,
        });
        self.lookup.insert(desc.clone(), handle);
        self.stats.misses += 1;
        rafx_debug!(
            SOURCE,
            "Created pipeline {:?} ({} / {:?})",
            handle,
            desc.vertex_entry,
            desc.fragment_entry
        );
        Ok(handle)
    }

    fn validate(&self, device: &D, desc: &PipelineDesc) -> Result<PipelineInfo> {
        let vertex = self.entry_point(desc.shader, &desc.vertex_entry)?;
        if vertex.stage != ShaderStage::Vertex {
            return Err(CompileError::EntryPointNotFound(desc.vertex_entry.clone()).into());
        }
        validate_vertex_layout(&vertex.inputs, &desc.vertex_layout, desc.vertex_stride)?;

        let mut push_constant_size = vertex.push_constant_size;
        if let Some(name) = &desc.fragment_entry {
            let fragment = self.entry_point(desc.shader, name)?;
            if fragment.stage != ShaderStage::Fragment {
                return Err(CompileError::EntryPointNotFound(name.clone()).into());
            }
            push_constant_size = push_constant_size.max(fragment.push_constant_size);
        }

        let budget = device.capabilities().max_push_constant_size;
        if push_constant_size > budget {
            return Err(CompileError::Shader {
                message: format!(
                    "push constant block of {} bytes exceeds the device budget of {}",
                    push_constant_size, budget
                ),
                location: None,
            }
            .into());
        }

        for &format in &desc.color_formats {
            if !format.is_color_renderable() || !device.supports_texture_format(format, TextureUsage::COLOR_TARGET) {
                return Err(CompileError::UnsupportedTargetFormat(format).into());
            }
        }
        if let Some(format) = desc.depth_format {
            if !format.is_depth() || !device.supports_texture_format(format, TextureUsage::DEPTH_STENCIL) {
                return Err(CompileError::UnsupportedTargetFormat(format).into());
            }
        }
        if desc.color_formats.is_empty() && desc.depth_format.is_none() {
            return Err(CompileError::IncompatibleVertexLayout(
                "pipeline has no color or depth target".to_string(),
            )
            .into());
        }
        if desc.multi_viewport && device.capabilities().max_viewports < 2 {
            return Err(CompileError::Shader {
                message: "device does not support multiple viewports".to_string(),
                location: None,
            }
            .into());
        }

        Ok(PipelineInfo {
            targets: desc.target_formats(),
            push_constant_size,
            consumes_vertices: !vertex.inputs.is_empty(),
            multi_viewport: desc.multi_viewport,
        })
    }

    /// Drop one reference to a pipeline
    ///
    /// The last reference retires it; the native release is deferred until
    /// its last frame completes.
    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> Result<()> {
        let entry = self
            .pipelines
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Pipeline))?;
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            rafx_trace!(SOURCE, "Pipeline {:?} still has {} refs", handle, entry.ref_count);
            return Ok(());
        }
        entry.retired = true;
        self.lookup.remove(&entry.desc);
        self.pending.push((handle, entry.last_used));
        Ok(())
    }

    /// Description a pipeline was created from
    pub fn pipeline_desc(&self, handle: PipelineHandle) -> Result<&PipelineDesc> {
        self.pipelines
            .get(handle)
            .filter(|e| !e.retired)
            .map(|e| &e.desc)
            .ok_or_else(|| ResourceError::InvalidHandle(HandleKind::Pipeline).into())
    }

    /// Validate a pipeline for recording in frame `serial` and mark it used
    pub(crate) fn use_pipeline(&mut self, handle: PipelineHandle, serial: u64) -> Result<&PipelineInfo> {
        let entry = self
            .pipelines
            .get_mut(handle)
            .filter(|e| !e.retired)
            .ok_or(ResourceError::InvalidHandle(HandleKind::Pipeline))?;
        entry.last_used = entry.last_used.max(serial);
        Ok(&entry.info)
    }

    /// Native pipeline behind a handle, including destroyed but unreleased ones
    pub fn resolve_pipeline(&self, handle: PipelineHandle) -> Option<&D::Pipeline> {
        self.pipelines.get(handle).map(|e| &e.native)
    }

    /// Release destroyed pipelines whose last use completed
    pub fn reconcile(&mut self, device: &mut D, completed_serial: u64) -> usize {
        let mut released = 0;
        let mut i = 0;
        while i < self.pending.len() {
            let (handle, retire_after) = self.pending[i];
            if retire_after > completed_serial {
                i += 1;
                continue;
            }
            self.pending.swap_remove(i);
            if let Some(entry) = self.pipelines.remove(handle) {
                device.destroy_pipeline(entry.native);
                released += 1;
            }
        }
        released
    }

    /// Release everything. The device must be idle.
    pub fn release_all(&mut self, device: &mut D) {
        self.pending.clear();
        self.lookup.clear();
        for (_, entry) in self.pipelines.drain() {
            device.destroy_pipeline(entry.native);
        }
        for (_, entry) in self.shaders.drain() {
            device.destroy_shader_module(entry.module);
        }
    }

    pub fn stats(&self) -> PipelineCacheStats {
        self.stats
    }

    /// Pipelines usable for new work
    pub fn live_pipeline_count(&self) -> usize {
        self.pipelines.values().filter(|e| !e.retired).count()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }
}

impl<D: GraphicsDevice> Default for PipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
