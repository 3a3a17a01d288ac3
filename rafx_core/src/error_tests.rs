//! Unit tests for error.rs
//!
//! Tests Display output, conversions into the top-level Error and the
//! fatal/recoverable classification.

use crate::error::*;
use crate::gpu::{Format, ResourceState};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_out_of_device_memory_display() {
    let err = ResourceError::OutOfDeviceMemory { requested: 4096 };
    let display = format!("{}", err);
    assert!(display.contains("Out of device memory"));
    assert!(display.contains("4096"));
}

#[test]
fn test_invalid_handle_display() {
    let err = ResourceError::InvalidHandle(HandleKind::Texture);
    assert_eq!(format!("{}", err), "Invalid texture handle");
}

#[test]
fn test_compile_error_display_with_location() {
    let err = CompileError::Shader {
        message: "undefined identifier 'foo'".to_string(),
        location: Some(SourceLocation {
            file: "shadow.slang".to_string(),
            line: 12,
            column: 5,
        }),
    };
    let display = format!("{}", err);
    assert!(display.contains("shadow.slang:12:5"));
    assert!(display.contains("undefined identifier 'foo'"));
}

#[test]
fn test_compile_error_display_without_location() {
    let err = CompileError::Shader {
        message: "empty source".to_string(),
        location: None,
    };
    assert_eq!(format!("{}", err), "Shader compilation failed: empty source");
}

#[test]
fn test_invalid_resource_state_display() {
    let err = StateError::InvalidResourceState {
        expected: ResourceState::DepthWrite,
        actual: ResourceState::ShaderRead,
    };
    let display = format!("{}", err);
    assert!(display.contains("DepthWrite"));
    assert!(display.contains("ShaderRead"));
}

#[test]
fn test_top_level_error_is_transparent() {
    let err: Error = StateError::NoActivePass.into();
    assert_eq!(format!("{}", err), "No active render pass");
}

// ============================================================================
// CONVERSIONS
// ============================================================================

#[test]
fn test_question_mark_converts_sub_errors() {
    fn fails() -> Result<()> {
        Err(CompileError::UnsupportedTargetFormat(Format::R32G32B32_SFLOAT))?;
        Ok(())
    }
    match fails() {
        Err(Error::Compile(CompileError::UnsupportedTargetFormat(f))) => {
            assert_eq!(f, Format::R32G32B32_SFLOAT);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_error_is_std_error() {
    let err: Error = DeviceError::SwapchainOutOfDate.into();
    let _: &dyn std::error::Error = &err;
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_device_lost_is_fatal() {
    let err: Error = DeviceError::DeviceLost("fence timeout".to_string()).into();
    assert!(err.is_fatal());
    assert!(!err.is_recoverable());
}

#[test]
fn test_swapchain_out_of_date_is_recoverable() {
    let err: Error = DeviceError::SwapchainOutOfDate.into();
    assert!(err.is_recoverable());
    assert!(!err.is_fatal());
}

#[test]
fn test_state_errors_are_neither_fatal_nor_recoverable() {
    let err: Error = StateError::NoPipelineBound.into();
    assert!(!err.is_fatal());
    assert!(!err.is_recoverable());
}
