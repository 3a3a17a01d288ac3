/// HeadlessCompiler - `ShaderCompiler` driven by declared reflections
///
/// The source text is not parsed beyond two diagnostics: an empty source and
/// `#error` lines. Entry points are resolved against the reflections
/// registered with [`HeadlessCompiler::with_entry_point`].

use crate::error::{CompileError, SourceLocation};
use crate::gpu::{
    CompiledEntryPoint, CompiledShader, EntryPointReflection, ShaderCode, ShaderCompiler,
    ShaderSource,
};

#[derive(Debug, Clone, Default)]
pub struct HeadlessCompiler {
    entry_points: Vec<EntryPointReflection>,
}

impl HeadlessCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entry point every compiled source provides
    pub fn with_entry_point(mut self, reflection: EntryPointReflection) -> Self {
        self.entry_points.push(reflection);
        self
    }
}

impl ShaderCompiler for HeadlessCompiler {
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader, CompileError> {
        if source.text.trim().is_empty() {
            return Err(CompileError::Shader {
                message: "empty shader source".to_string(),
                location: Some(SourceLocation {
                    file: source.name.clone(),
                    line: 1,
                    column: 1,
                }),
            });
        }

        for (index, line) in source.text.lines().enumerate() {
            let trimmed = line.trim_start();
            if let Some(message) = trimmed.strip_prefix("#error") {
                return Err(CompileError::Shader {
                    message: message.trim().to_string(),
                    location: Some(SourceLocation {
                        file: source.name.clone(),
                        line: index as u32 + 1,
                        column: (line.len() - trimmed.len()) as u32 + 1,
                    }),
                });
            }
        }

        let selected: Vec<&EntryPointReflection> = if source.entry_points.is_empty() {
            self.entry_points.iter().collect()
        } else {
            source
                .entry_points
                .iter()
                .map(|request| {
                    self.entry_points
                        .iter()
                        .find(|ep| ep.name == request.name)
                        .ok_or_else(|| CompileError::EntryPointNotFound(request.name.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        Ok(CompiledShader {
            name: source.name.clone(),
            entry_points: selected
                .into_iter()
                .map(|reflection| CompiledEntryPoint {
                    reflection: reflection.clone(),
                    code: ShaderCode::Source(source.text.clone()),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
#[path = "headless_compiler_tests.rs"]
mod tests;
