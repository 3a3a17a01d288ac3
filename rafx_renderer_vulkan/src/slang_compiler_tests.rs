//! Unit tests for SlangCompiler helpers
//!
//! Diagnostics parsing, entry-point discovery and SPIR-V checks run without
//! slangc. The end-to-end test needs slangc on the PATH and is ignored.

use super::*;
use serial_test::serial;

const SHADER: &str = r#"
struct VSInput {
    float3 position : POSITION;
    float3 normal : NORMAL;
};

[shader("vertex")]
float4 vsShadow(VSInput input) : SV_Position
{
    return float4(input.position, 1.0);
}

[shader("fragment")]
float4 fsMain(float4 position : SV_Position) : SV_Target
{
    return float4(1.0, 1.0, 1.0, 1.0);
}
"#;

// ============================================================================
// ENTRY POINT DISCOVERY
// ============================================================================

#[test]
fn test_discover_entry_points_from_attributes() {
    let requests = discover_entry_points(SHADER);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].name, "vsShadow");
    assert_eq!(requests[0].stage, ShaderStage::Vertex);
    assert_eq!(requests[1].name, "fsMain");
    assert_eq!(requests[1].stage, ShaderStage::Fragment);
}

#[test]
fn test_discover_entry_points_same_line() {
    let requests = discover_entry_points("[shader(\"compute\")] void csClear(uint3 id : SV_DispatchThreadID) {}");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "csClear");
    assert_eq!(requests[0].stage, ShaderStage::Compute);
}

#[test]
fn test_discover_entry_points_skips_extra_attributes() {
    let text = "[shader(\"pixel\")]\n[earlydepthstencil]\nfloat4 psMain() : SV_Target { return 0; }";
    let requests = discover_entry_points(text);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "psMain");
    assert_eq!(requests[0].stage, ShaderStage::Fragment);
}

#[test]
fn test_discover_entry_points_none() {
    assert!(discover_entry_points("float helper(float x) { return x; }").is_empty());
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[test]
fn test_parse_diagnostic_with_column() {
    let output = "shadow.slang(12,5): error 30015: undefined identifier 'lightDir'.\n    lightDir\n";
    let (location, message) = parse_diagnostic(output).unwrap();
    assert_eq!(location.file, "shadow.slang");
    assert_eq!(location.line, 12);
    assert_eq!(location.column, 5);
    assert_eq!(message, "undefined identifier 'lightDir'.");
}

#[test]
fn test_parse_diagnostic_line_only() {
    let output = "note: something first\n/tmp/x/shader.slang(3): error 20001: unexpected '}'\n";
    let (location, message) = parse_diagnostic(output).unwrap();
    assert_eq!(location.file, "/tmp/x/shader.slang");
    assert_eq!(location.line, 3);
    assert_eq!(location.column, 1);
    assert_eq!(message, "unexpected '}'");
}

#[test]
fn test_parse_diagnostic_ignores_warnings() {
    assert!(parse_diagnostic("a.slang(1): warning 15205: unused variable").is_none());
}

#[test]
fn test_diagnostic_error_renames_temporary_file() {
    let path = Path::new("/tmp/work/shadow_mapping.slang");
    let stderr = "/tmp/work/shadow_mapping.slang(40,9): error 30019: type mismatch";
    let error = diagnostic_error(stderr, path, "shaders/shadow_mapping.slang", "vsMain");
    match error {
        CompileError::Shader { message, location } => {
            assert_eq!(message, "type mismatch");
            let location = location.unwrap();
            assert_eq!(location.file, "shaders/shadow_mapping.slang");
            assert_eq!(location.line, 40);
            assert_eq!(location.column, 9);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_diagnostic_error_keeps_include_file_name() {
    let path = Path::new("/tmp/work/main.slang");
    let stderr = "/opt/shaders/rafx.slang(2): error 30015: undefined identifier 'x'";
    match diagnostic_error(stderr, path, "main.slang", "vsMain") {
        CompileError::Shader { location, .. } => {
            assert_eq!(location.unwrap().file, "/opt/shaders/rafx.slang");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_diagnostic_error_entry_point_not_found() {
    let path = Path::new("/tmp/work/main.slang");
    let stderr = "(0): error 38000: no function found matching entry point name 'vsMissing'";
    assert_eq!(
        diagnostic_error(stderr, path, "main.slang", "vsMissing"),
        CompileError::EntryPointNotFound("vsMissing".to_string())
    );
}

#[test]
fn test_diagnostic_error_without_output() {
    let error = diagnostic_error("", Path::new("/tmp/a.slang"), "a.slang", "vsMain");
    assert_eq!(
        error,
        CompileError::Shader {
            message: "slangc failed without diagnostics".to_string(),
            location: None,
        }
    );
}

// ============================================================================
// SPIR-V
// ============================================================================

fn header(magic: u32) -> Vec<u8> {
    [magic, 0x0001_0500, 0, 16, 0].iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_spirv_words_valid_header() {
    let words = spirv_words(&header(SPIRV_MAGIC)).unwrap();
    assert_eq!(words.len(), 5);
    assert_eq!(words[0], SPIRV_MAGIC);
    assert_eq!(words[1], 0x0001_0500);
}

#[test]
fn test_spirv_words_bad_magic() {
    assert!(matches!(spirv_words(&header(0xdead_beef)), Err(CompileError::Shader { .. })));
}

#[test]
fn test_spirv_words_unaligned_length() {
    let mut bytes = header(SPIRV_MAGIC);
    bytes.push(0);
    assert!(spirv_words(&bytes).is_err());
}

// ============================================================================
// REFLECTION HELPERS
// ============================================================================

#[test]
fn test_input_format_float_vectors() {
    use spirq::ty::{ScalarType, Type, VectorType};
    let vec3 = Type::Vector(VectorType {
        scalar_ty: ScalarType::Float { bits: 32 },
        nscalar: 3,
    });
    assert_eq!(input_format(&vec3), Some(Format::R32G32B32_SFLOAT));
    assert_eq!(input_format(&Type::Scalar(ScalarType::Float { bits: 32 })), Some(Format::R32_SFLOAT));
    assert_eq!(input_format(&Type::Scalar(ScalarType::Float { bits: 64 })), None);
}

#[test]
fn test_stage_name() {
    assert_eq!(stage_name(ShaderStage::Vertex), "vertex");
    assert_eq!(stage_name(ShaderStage::Fragment), "fragment");
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
#[serial]
fn test_executable_from_environment() {
    std::env::set_var(SLANGC_ENV, "/opt/slang/bin/slangc");
    let compiler = SlangCompiler::new();
    std::env::remove_var(SLANGC_ENV);
    assert_eq!(compiler.executable(), Path::new("/opt/slang/bin/slangc"));
}

#[test]
#[serial]
fn test_executable_default_and_override() {
    std::env::remove_var(SLANGC_ENV);
    assert_eq!(SlangCompiler::new().executable(), Path::new("slangc"));
    let compiler = SlangCompiler::new().with_executable("/usr/local/bin/slangc");
    assert_eq!(compiler.executable(), Path::new("/usr/local/bin/slangc"));
}

#[test]
fn test_compile_missing_executable_reports_shader_error() {
    let compiler = SlangCompiler::new().with_executable("/nonexistent/slangc");
    let source = ShaderSource::new("shadow.slang", SHADER);
    match compiler.compile(&source) {
        Err(CompileError::Shader { message, location }) => {
            assert!(message.contains("/nonexistent/slangc"));
            assert!(location.is_none());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_compile_without_entry_points() {
    let compiler = SlangCompiler::new().with_executable("/nonexistent/slangc");
    let source = ShaderSource::new("empty.slang", "float helper(float x) { return x; }");
    assert!(matches!(compiler.compile(&source), Err(CompileError::Shader { .. })));
}

#[test]
#[ignore = "requires slangc"]
fn test_compile_and_reflect_with_slangc() {
    let compiler = SlangCompiler::new();
    let shader = compiler.compile(&ShaderSource::new("shadow.slang", SHADER)).unwrap();
    let vertex = shader.entry_point("vsShadow").unwrap();
    assert_eq!(vertex.reflection.stage, ShaderStage::Vertex);
    assert_eq!(vertex.reflection.inputs.len(), 2);
    assert_eq!(vertex.reflection.inputs[0].format, Some(Format::R32G32B32_SFLOAT));
    assert!(matches!(vertex.code, ShaderCode::Spirv(_)));
}
