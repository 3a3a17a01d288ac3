/// Pipeline descriptor and its fixed-function states

use std::hash::{Hash, Hasher};

use crate::error::CompileError;
use crate::gpu::{Format, ShaderHandle, ShaderInput};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

// ===== RASTERIZATION =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Depth bias triple
///
/// Compared and hashed bit-for-bit so descriptions can key the pipeline cache.
#[derive(Debug, Clone, Copy)]
pub struct DepthBias {
    /// Constant depth offset
    pub constant_factor: f32,
    /// Maximum depth bias clamp
    pub clamp: f32,
    /// Slope-based depth offset
    pub slope_factor: f32,
}

impl PartialEq for DepthBias {
    fn eq(&self, other: &Self) -> bool {
        self.constant_factor.to_bits() == other.constant_factor.to_bits()
            && self.clamp.to_bits() == other.clamp.to_bits()
            && self.slope_factor.to_bits() == other.slope_factor.to_bits()
    }
}

impl Eq for DepthBias {}

impl Hash for DepthBias {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.constant_factor.to_bits().hash(state);
        self.clamp.to_bits().hash(state);
        self.slope_factor.to_bits().hash(state);
    }
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// Depth bias (None = disabled)
    pub depth_bias: Option<DepthBias>,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_bias: None,
        }
    }
}

// ===== DEPTH =====

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Depth test/write state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare: CompareOp::Less,
        }
    }
}

// ===== VERTEX LAYOUT =====

/// One element of an interleaved vertex layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Shader input slot (location)
    pub slot: u32,
    /// Component format
    pub format: Format,
    /// Byte offset inside the vertex
    pub offset: u32,
    /// Semantic name ("POSITION", "NORMAL", ...)
    pub semantic: String,
}

impl VertexElement {
    pub fn new(slot: u32, format: Format, offset: u32, semantic: &str) -> Self {
        Self {
            slot,
            format,
            offset,
            semantic: semantic.to_string(),
        }
    }
}

/// Compare semantics case-insensitively, treating `TEXCOORD0` and `TEXCOORD` alike
fn semantic_eq(a: &str, b: &str) -> bool {
    fn normalize(s: &str) -> String {
        let upper = s.to_ascii_uppercase();
        match upper.strip_suffix('0') {
            Some(base) if !base.is_empty() && !base.ends_with(|c: char| c.is_ascii_digit()) => base.to_string(),
            _ => upper,
        }
    }
    normalize(a) == normalize(b)
}

/// Check that `layout` enumerates exactly the shader's vertex `inputs`, in order
pub fn validate_vertex_layout(
    inputs: &[ShaderInput],
    layout: &[VertexElement],
    stride: u32,
) -> Result<(), CompileError> {
    if inputs.len() != layout.len() {
        return Err(CompileError::IncompatibleVertexLayout(format!(
            "shader declares {} inputs, layout provides {}",
            inputs.len(),
            layout.len()
        )));
    }

    let mut sorted: Vec<&ShaderInput> = inputs.iter().collect();
    sorted.sort_by_key(|input| input.location);

    for (input, element) in sorted.iter().zip(layout) {
        if input.location != element.slot {
            return Err(CompileError::IncompatibleVertexLayout(format!(
                "element '{}' uses slot {}, shader expects location {}",
                element.semantic, element.slot, input.location
            )));
        }
        if let Some(semantic) = &input.semantic {
            if !semantic_eq(semantic, &element.semantic) {
                return Err(CompileError::IncompatibleVertexLayout(format!(
                    "slot {}: layout semantic '{}' does not match shader semantic '{}'",
                    element.slot, element.semantic, semantic
                )));
            }
        }
        if let Some(format) = input.format {
            if format.component_count() != element.format.component_count() {
                return Err(CompileError::IncompatibleVertexLayout(format!(
                    "slot {}: layout format {:?} does not match shader format {:?}",
                    element.slot, element.format, format
                )));
            }
        }
        let fits = element
            .offset
            .checked_add(element.format.size_bytes())
            .is_some_and(|end| end <= stride);
        if !fits {
            return Err(CompileError::IncompatibleVertexLayout(format!(
                "element '{}' (offset {}, {} bytes) overflows stride {}",
                element.semantic,
                element.offset,
                element.format.size_bytes(),
                stride
            )));
        }
    }
    Ok(())
}

// ===== TARGET FORMATS =====

/// Formats of the attachments of a render pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetFormats {
    pub colors: Vec<Format>,
    pub depth: Option<Format>,
}

// ===== PIPELINE DESC =====

/// Full pipeline description
///
/// Equality covers every field; equal descriptions share one cached pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    /// Shader module providing the entry points
    pub shader: ShaderHandle,
    pub vertex_entry: String,
    /// Fragment entry point (None for depth-only pipelines)
    pub fragment_entry: Option<String>,
    pub vertex_layout: Vec<VertexElement>,
    pub vertex_stride: u32,
    pub topology: PrimitiveTopology,
    pub rasterizer: RasterizerState,
    pub depth: DepthState,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    /// Whether the pipeline accepts more than one viewport
    pub multi_viewport: bool,
}

impl PipelineDesc {
    /// Pipeline with default states, no targets and no vertex layout
    pub fn new(shader: ShaderHandle, vertex_entry: &str, fragment_entry: Option<&str>) -> Self {
        Self {
            shader,
            vertex_entry: vertex_entry.to_string(),
            fragment_entry: fragment_entry.map(str::to_string),
            vertex_layout: Vec::new(),
            vertex_stride: 0,
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerState::default(),
            depth: DepthState::default(),
            color_formats: Vec::new(),
            depth_format: None,
            multi_viewport: false,
        }
    }

    /// Target formats this pipeline renders into
    pub fn target_formats(&self) -> RenderTargetFormats {
        RenderTargetFormats {
            colors: self.color_formats.clone(),
            depth: self.depth_format,
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
