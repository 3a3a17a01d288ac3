/// SlangCompiler - `ShaderCompiler` built on the `slangc` command-line compiler
///
/// Each requested entry point is compiled to its own SPIR-V 1.5 module in a
/// temporary directory, then reflected with spirq (vertex inputs and
/// push-constant size). Entry-point names are kept in the SPIR-V so the
/// pipeline can refer to them directly.

use rafx_core::rafx::{
    CompileError, CompiledEntryPoint, CompiledShader, EntryPointReflection, EntryPointRequest, Format,
    ShaderCode, ShaderCompiler, ShaderInput, ShaderSource, ShaderStage, SourceLocation,
};
use rafx_core::{rafx_debug, rafx_trace};
use std::path::{Path, PathBuf};
use std::process::Command;

const SOURCE: &str = "rafx::slang";

/// Environment variable overriding the `slangc` executable
pub const SLANGC_ENV: &str = "RAFX_SLANGC";

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Clone)]
pub struct SlangCompiler {
    executable: PathBuf,
    include_paths: Vec<PathBuf>,
}

impl Default for SlangCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SlangCompiler {
    /// Compiler using `$RAFX_SLANGC`, or `slangc` from the PATH
    pub fn new() -> Self {
        let executable = std::env::var_os(SLANGC_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("slangc"));
        Self {
            executable,
            include_paths: Vec::new(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Include directory added to every compilation
    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn compile_entry_point(
        &self,
        source: &ShaderSource,
        source_path: &Path,
        output_path: &Path,
        request: &EntryPointRequest,
    ) -> Result<Vec<u32>, CompileError> {
        let mut command = Command::new(&self.executable);
        command
            .arg(source_path)
            .args(["-target", "spirv", "-profile", "spirv_1_5"])
            .args(["-entry", &request.name])
            .args(["-stage", stage_name(request.stage)])
            .arg("-fvk-use-entrypoint-name")
            .arg("-matrix-layout-column-major");
        for path in self.include_paths.iter().chain(&source.include_paths) {
            command.arg("-I").arg(path);
        }
        for (name, value) in &source.defines {
            match value {
                Some(value) => command.arg(format!("-D{}={}", name, value)),
                None => command.arg(format!("-D{}", name)),
            };
        }
        command.arg("-o").arg(output_path);

        rafx_trace!(SOURCE, "Running {:?}", command);
        let output = command.output().map_err(|e| CompileError::Shader {
            message: format!("failed to run {}: {}", self.executable.display(), e),
            location: None,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(diagnostic_error(&stderr, source_path, &source.name, &request.name));
        }

        let bytes = std::fs::read(output_path).map_err(|e| CompileError::Shader {
            message: format!("slangc produced no output for '{}': {}", request.name, e),
            location: None,
        })?;
        spirv_words(&bytes)
    }
}

impl ShaderCompiler for SlangCompiler {
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader, CompileError> {
        let requests = if source.entry_points.is_empty() {
            discover_entry_points(&source.text)
        } else {
            source.entry_points.clone()
        };
        if requests.is_empty() {
            return Err(CompileError::Shader {
                message: format!("'{}' declares no entry points", source.name),
                location: None,
            });
        }

        let work_dir = tempfile::tempdir().map_err(|e| CompileError::Shader {
            message: format!("failed to create a temporary directory: {}", e),
            location: None,
        })?;
        let file_name = Path::new(&source.name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "shader.slang".into());
        let source_path = work_dir.path().join(file_name);
        std::fs::write(&source_path, &source.text).map_err(|e| CompileError::Shader {
            message: format!("failed to write {}: {}", source_path.display(), e),
            location: None,
        })?;

        let mut entry_points = Vec::with_capacity(requests.len());
        for request in &requests {
            let output_path = work_dir.path().join(format!("{}.spv", request.name));
            let words = self.compile_entry_point(source, &source_path, &output_path, request)?;
            let reflection = reflect(&words, request)?;
            rafx_debug!(
                SOURCE,
                "Compiled {}::{} ({} words, {} inputs, {} push-constant bytes)",
                source.name,
                request.name,
                words.len(),
                reflection.inputs.len(),
                reflection.push_constant_size
            );
            entry_points.push(CompiledEntryPoint {
                reflection,
                code: ShaderCode::Spirv(words),
            });
        }

        Ok(CompiledShader {
            name: source.name.clone(),
            entry_points,
        })
    }
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        ShaderStage::Compute => "compute",
    }
}

/// Entry points declared with `[shader("vertex")]`-style attributes
pub(crate) fn discover_entry_points(text: &str) -> Vec<EntryPointRequest> {
    let mut requests = Vec::new();
    let mut pending: Option<ShaderStage> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("[shader(\"") {
            pending = match rest.split('"').next() {
                Some("vertex") => Some(ShaderStage::Vertex),
                Some("fragment") | Some("pixel") => Some(ShaderStage::Fragment),
                Some("compute") => Some(ShaderStage::Compute),
                _ => None,
            };
            // Attribute and signature may share a line
            let after = rest.split_once(")]").map(|(_, tail)| tail.trim()).unwrap_or("");
            if after.is_empty() {
                continue;
            }
            if let (Some(stage), Some(name)) = (pending, function_name(after)) {
                requests.push(EntryPointRequest { name, stage });
                pending = None;
            }
            continue;
        }
        if let Some(stage) = pending {
            if line.is_empty() || line.starts_with('[') {
                continue;
            }
            if let Some(name) = function_name(line) {
                requests.push(EntryPointRequest { name, stage });
            }
            pending = None;
        }
    }
    requests
}

/// Name of the function declared on `line` (`RetType name(...)`)
fn function_name(line: &str) -> Option<String> {
    let head = line.split('(').next()?.trim();
    let name = head.split_whitespace().last()?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| name.to_string())
}

/// First `file(line[,col]): error N: message` diagnostic in `output`
pub(crate) fn parse_diagnostic(output: &str) -> Option<(SourceLocation, String)> {
    output.lines().find_map(|line| {
        let (head, message) = line.split_once("): error")?;
        let open = head.rfind('(')?;
        let file = head[..open].trim().to_string();
        let mut position = head[open + 1..].split(',');
        let line_number = position.next()?.trim().parse().ok()?;
        let column = position
            .next()
            .and_then(|c| c.trim().parse().ok())
            .unwrap_or(1);
        // "error 30015: message"
        let message = message
            .split_once(':')
            .map(|(_, text)| text)
            .unwrap_or(message)
            .trim()
            .to_string();
        Some((
            SourceLocation {
                file,
                line: line_number,
                column,
            },
            message,
        ))
    })
}

fn diagnostic_error(stderr: &str, source_path: &Path, source_name: &str, entry_point: &str) -> CompileError {
    let Some((mut location, message)) = parse_diagnostic(stderr) else {
        let message = stderr.trim();
        if message.to_lowercase().contains("entry point") && message.contains(entry_point) {
            return CompileError::EntryPointNotFound(entry_point.to_string());
        }
        return CompileError::Shader {
            message: if message.is_empty() {
                "slangc failed without diagnostics".to_string()
            } else {
                message.to_string()
            },
            location: None,
        };
    };

    if message.to_lowercase().contains("entry point") && message.contains(entry_point) {
        return CompileError::EntryPointNotFound(entry_point.to_string());
    }
    // Report the caller's name rather than the temporary path
    if Path::new(&location.file) == source_path
        || source_path
            .file_name()
            .is_some_and(|name| location.file.ends_with(&*name.to_string_lossy()))
    {
        location.file = source_name.to_string();
    }
    CompileError::Shader {
        message,
        location: Some(location),
    }
}

/// Little-endian SPIR-V bytes to words
pub(crate) fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, CompileError> {
    if bytes.len() % 4 != 0 || bytes.len() < 20 {
        return Err(CompileError::Shader {
            message: format!("invalid SPIR-V size: {} bytes", bytes.len()),
            location: None,
        });
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(CompileError::Shader {
            message: format!("invalid SPIR-V magic number {:#010x}", words[0]),
            location: None,
        });
    }
    Ok(words)
}

/// Vertex-input format of a reflected type
pub(crate) fn input_format(ty: &spirq::ty::Type) -> Option<Format> {
    use spirq::ty::{ScalarType, Type};
    match ty {
        Type::Scalar(ScalarType::Float { bits: 32 }) => Some(Format::R32_SFLOAT),
        Type::Scalar(ScalarType::Integer { bits: 32, is_signed: false }) => Some(Format::R32_UINT),
        Type::Vector(vector) if matches!(vector.scalar_ty, ScalarType::Float { bits: 32 }) => {
            match vector.nscalar {
                2 => Some(Format::R32G32_SFLOAT),
                3 => Some(Format::R32G32B32_SFLOAT),
                4 => Some(Format::R32G32B32A32_SFLOAT),
                _ => None,
            }
        }
        _ => None,
    }
}

fn reflect(words: &[u32], request: &EntryPointRequest) -> Result<EntryPointReflection, CompileError> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| CompileError::Shader {
            message: format!("SPIR-V reflection failed for '{}': {:?}", request.name, e),
            location: None,
        })?;
    let entry_point = entry_points
        .iter()
        .find(|ep| ep.name == request.name)
        .or_else(|| entry_points.first())
        .ok_or_else(|| CompileError::EntryPointNotFound(request.name.clone()))?;

    let mut reflection = EntryPointReflection::new(request.name.clone(), request.stage);
    for var in entry_point.vars.iter() {
        match var {
            spirq::var::Variable::Input { location, ty, .. } if request.stage == ShaderStage::Vertex => {
                reflection.inputs.push(ShaderInput {
                    location: location.loc(),
                    semantic: None,
                    format: input_format(ty),
                });
            }
            spirq::var::Variable::PushConstant { ty, .. } => {
                let size = ty.nbyte().unwrap_or(0) as u32;
                reflection.push_constant_size = reflection.push_constant_size.max(size);
            }
            _ => {}
        }
    }
    reflection.inputs.sort_by_key(|input| input.location);
    Ok(reflection)
}

#[cfg(test)]
#[path = "slang_compiler_tests.rs"]
mod tests;
