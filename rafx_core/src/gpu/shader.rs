/// Shader sources, compiled modules, reflection and the compiler collaborator

use std::path::PathBuf;

use crate::error::CompileError;
use crate::gpu::Format;

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Entry point the caller wants compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointRequest {
    pub name: String,
    pub stage: ShaderStage,
}

/// Shader source unit with its compilation environment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderSource {
    /// File name used in diagnostics
    pub name: String,
    /// Source text
    pub text: String,
    /// Entry points to compile
    pub entry_points: Vec<EntryPointRequest>,
    /// Preprocessor defines (`NAME` or `NAME=VALUE`)
    pub defines: Vec<(String, Option<String>)>,
    /// Directories searched for includes/imports
    pub include_paths: Vec<PathBuf>,
}

impl ShaderSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Request an entry point
    pub fn entry_point(mut self, name: impl Into<String>, stage: ShaderStage) -> Self {
        self.entry_points.push(EntryPointRequest { name: name.into(), stage });
        self
    }

    /// Add a preprocessor define
    pub fn define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Add an include search path
    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }
}

// ===== REFLECTION =====

/// One vertex input declared by a vertex entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    /// Input location
    pub location: u32,
    /// Semantic name, when the reflection front-end exposes it
    pub semantic: Option<String>,
    /// Component format, when known
    pub format: Option<Format>,
}

/// Reflection data of one entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointReflection {
    pub name: String,
    pub stage: ShaderStage,
    /// Vertex inputs (vertex stage only), in declaration order
    pub inputs: Vec<ShaderInput>,
    /// Size of the push-constant block in bytes (0 = none)
    pub push_constant_size: u32,
}

impl EntryPointReflection {
    pub fn new(name: impl Into<String>, stage: ShaderStage) -> Self {
        Self {
            name: name.into(),
            stage,
            inputs: Vec::new(),
            push_constant_size: 0,
        }
    }

    /// Declare a vertex input
    pub fn input(mut self, location: u32, semantic: &str, format: Format) -> Self {
        self.inputs.push(ShaderInput {
            location,
            semantic: Some(semantic.to_string()),
            format: Some(format),
        });
        self
    }

    /// Declare the push-constant block size
    pub fn push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }
}

/// Backend-consumable code of one entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCode {
    /// SPIR-V words
    Spirv(Vec<u32>),
    /// Source text for backends that compile at runtime
    Source(String),
}

/// One compiled entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntryPoint {
    pub reflection: EntryPointReflection,
    pub code: ShaderCode,
}

/// Compiler output for one source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledShader {
    pub name: String,
    pub entry_points: Vec<CompiledEntryPoint>,
}

impl CompiledShader {
    /// Find an entry point by name
    pub fn entry_point(&self, name: &str) -> Option<&CompiledEntryPoint> {
        self.entry_points.iter().find(|ep| ep.reflection.name == name)
    }
}

// ===== COMPILER =====

/// Shader cross-compiler and reflection front-end
///
/// Invoked once per shader at startup, never on the per-frame path.
pub trait ShaderCompiler {
    /// Compile every requested entry point of `source`
    ///
    /// # Errors
    ///
    /// `CompileError::Shader` with the diagnostic text and location, or
    /// `CompileError::EntryPointNotFound` for a missing entry point.
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader, CompileError>;
}
