//! Error types for rafx
//!
//! Errors are grouped by the layer that detects them:
//! - [`ResourceError`]: creation, destruction and lookup of GPU resources
//! - [`CompileError`]: shader compilation and pipeline description mismatches
//! - [`StateError`]: misuse of the command recording contract
//! - [`DeviceError`]: swapchain and device level failures
//!
//! All public APIs return [`Result<T>`], an alias for `std::result::Result<T, Error>`.

use thiserror::Error;

use crate::gpu::{Format, ResourceState};

/// Result type for rafx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level rafx error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl Error {
    /// Whether the device is unusable after this error.
    ///
    /// The caller must terminate or fully reinitialize the context.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Device(DeviceError::DeviceLost(_)))
    }

    /// Whether the caller can recover by rebuilding size-dependent resources
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Device(DeviceError::SwapchainOutOfDate))
    }
}

// ============================================================================
// Resource errors
// ============================================================================

/// Kind of object a handle refers to (used in error messages)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Buffer,
    Texture,
    Shader,
    Pipeline,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleKind::Buffer => "buffer",
            HandleKind::Texture => "texture",
            HandleKind::Shader => "shader",
            HandleKind::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Resource creation and lookup failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The device could not satisfy an allocation
    #[error("Out of device memory (requested {requested} bytes)")]
    OutOfDeviceMemory { requested: u64 },

    /// The format cannot back the requested resource on this device
    #[error("Unsupported format: {0:?}")]
    UnsupportedFormat(Format),

    /// Usage flags contradict each other or the format
    #[error("Unsupported usage combination: {0}")]
    UnsupportedUsageCombination(String),

    /// Handle was never created, or was already destroyed
    #[error("Invalid {0} handle")]
    InvalidHandle(HandleKind),

    /// No free slot left in the bindless texture table
    #[error("Bindless texture table full ({capacity} slots)")]
    BindlessTableFull { capacity: u32 },

    /// Description is malformed (zero size, data size mismatch, out of range write...)
    #[error("Invalid resource description: {0}")]
    InvalidDescription(String),
}

// ============================================================================
// Compile errors
// ============================================================================

/// Position of a diagnostic in shader source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Shader compilation and pipeline description failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The shader compiler rejected the source
    #[error("Shader compilation failed{}: {message}", .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Shader {
        message: String,
        location: Option<SourceLocation>,
    },

    /// A requested entry point does not exist in the shader module
    #[error("Entry point '{0}' not found")]
    EntryPointNotFound(String),

    /// Vertex layout does not enumerate the shader's inputs
    #[error("Incompatible vertex layout: {0}")]
    IncompatibleVertexLayout(String),

    /// Color or depth target format cannot be rendered to
    #[error("Unsupported render target format: {0:?}")]
    UnsupportedTargetFormat(Format),
}

// ============================================================================
// State errors
// ============================================================================

/// Violations of the command recording contract
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// A render target is not in the state the operation requires
    #[error("Invalid resource state: expected {expected:?}, found {actual:?}")]
    InvalidResourceState {
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("No pipeline bound since the render pass began")]
    NoPipelineBound,

    #[error("No index buffer bound since the render pass began")]
    NoIndexBufferBound,

    #[error("No vertex buffer bound but the pipeline consumes vertex inputs")]
    NoVertexBufferBound,

    #[error("No active render pass")]
    NoActivePass,

    #[error("A render pass is already active")]
    PassAlreadyActive,

    #[error("Render pass still active at end of frame")]
    PassStillActive,

    #[error("Render pass has no color or depth target")]
    EmptyRenderPass,

    #[error("Render pass attachments have different dimensions")]
    AttachmentSizeMismatch,

    /// Pipeline target formats differ from the active pass formats
    #[error("Pipeline render target formats do not match the active render pass")]
    PipelineRenderTargetMismatch,

    /// Resource usage flags do not allow the operation
    #[error("Resource usage does not allow {0}")]
    IncompatibleUsage(&'static str),

    #[error("Push constants too large: {size} bytes (device budget {max})")]
    PushConstantsTooLarge { size: u32, max: u32 },

    #[error("Push constants size {size} exceeds the shader block size {declared}")]
    PushConstantSizeMismatch { size: u32, declared: u32 },

    #[error("Bound pipeline does not declare multi-viewport support")]
    MultiViewportUnsupported,

    #[error("Resource transitions are not allowed inside a render pass")]
    TransitionInsidePass,

    #[error("Unbalanced debug event scope")]
    UnbalancedEvent,

    #[error("No active frame (call begin_frame first)")]
    NoActiveFrame,

    #[error("A frame is already active (call end_frame first)")]
    FrameAlreadyActive,
}

// ============================================================================
// Device errors
// ============================================================================

/// Swapchain and device level failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Swapchain no longer matches the surface. Rebuild size-dependent resources.
    #[error("Swapchain out of date")]
    SwapchainOutOfDate,

    /// Device lost or unresponsive. Fatal.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
